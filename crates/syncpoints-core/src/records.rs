//! Serde records for the persistence and export boundary
//!
//! A graph is stored as a vertex list and an edge list. Edge ids are
//! positions in the edge list, which is how starting-edge records refer to
//! them.

use serde::{Deserialize, Serialize};

use crate::engine::{Color, EdgeId, EngineError, Graph, Simulation, Vertex, VertexId};
use crate::error::SyncPointsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub id: VertexId,
    pub init_sync: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub absorbing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: VertexId,
    pub target: VertexId,
    pub weight: f64,
}

/// Vertex/edge list form of a [`Graph`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Reject parallel edges when loading
    #[serde(default)]
    pub strict: bool,
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphDocument {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            strict: graph.forbids_parallel_edges(),
            vertices: graph
                .vertices()
                .map(|v| VertexRecord {
                    id: v.id,
                    init_sync: v.init_sync,
                    absorbing: v.absorbing,
                })
                .collect(),
            edges: graph
                .edges()
                .map(|e| EdgeRecord {
                    source: e.source,
                    target: e.target,
                    weight: e.weight,
                })
                .collect(),
        }
    }

    /// Build the graph, failing on the first invalid record
    pub fn to_graph(&self) -> Result<Graph, EngineError> {
        let mut graph = if self.strict {
            Graph::strict()
        } else {
            Graph::new()
        };
        for record in &self.vertices {
            let vertex = if record.absorbing {
                Vertex::sink(record.id)
            } else {
                Vertex::new(record.id, record.init_sync)?
            };
            graph.add_vertex(vertex)?;
        }
        for record in &self.edges {
            graph.add_edge(record.source, record.target, record.weight)?;
        }
        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self, SyncPointsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SyncPointsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Seed state of one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartingEdgeRecord {
    #[serde(rename = "edgeID")]
    pub edge_id: EdgeId,
    #[serde(default)]
    pub blue_dots_count: u32,
    #[serde(default)]
    pub green_dots_count: u32,
}

impl StartingEdgeRecord {
    /// `count` blue tokens on `edge_id`
    pub fn blue(edge_id: EdgeId, count: u32) -> Self {
        Self {
            edge_id,
            blue_dots_count: count,
            green_dots_count: 0,
        }
    }
}

/// Current starting tokens of a simulation, by edge id
pub fn export_starting_edges(simulation: &Simulation) -> Vec<StartingEdgeRecord> {
    simulation
        .starting_tokens()
        .map(|(edge_id, blue, green)| StartingEdgeRecord {
            edge_id,
            blue_dots_count: blue,
            green_dots_count: green,
        })
        .collect()
}

/// Replace the starting tokens of a simulation
///
/// Every edge is checked before anything changes, so an unknown edge
/// leaves the previous seed state in place.
pub fn import_starting_edges(
    simulation: &mut Simulation,
    records: &[StartingEdgeRecord],
) -> Result<(), EngineError> {
    if let Some(unknown) = records
        .iter()
        .find(|r| simulation.graph().edge(r.edge_id).is_none())
    {
        return Err(EngineError::UnknownEdge(unknown.edge_id));
    }
    simulation.clear_starting_tokens();
    for record in records {
        simulation.set_starting_tokens(record.edge_id, Color::Blue, record.blue_dots_count)?;
        simulation.set_starting_tokens(record.edge_id, Color::Green, record.green_dots_count)?;
    }
    tracing::debug!(edges = records.len(), "Starting edges imported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn document() -> GraphDocument {
        GraphDocument {
            strict: false,
            vertices: vec![
                VertexRecord {
                    id: VertexId(0),
                    init_sync: 2,
                    absorbing: false,
                },
                VertexRecord {
                    id: VertexId(1),
                    init_sync: 1,
                    absorbing: false,
                },
                VertexRecord {
                    id: VertexId(2),
                    init_sync: 1,
                    absorbing: true,
                },
            ],
            edges: vec![
                EdgeRecord {
                    source: VertexId(0),
                    target: VertexId(1),
                    weight: 1.5,
                },
                EdgeRecord {
                    source: VertexId(1),
                    target: VertexId(2),
                    weight: 2.0,
                },
            ],
        }
    }

    #[test]
    fn test_document_to_graph_and_back() {
        let graph = document().to_graph().unwrap();
        assert_eq!(graph.vertex_count(), 3);
        assert!(graph.vertex(VertexId(2)).unwrap().absorbing);
        assert_eq!(graph.edge(EdgeId(1)).unwrap().weight, 2.0);
        assert_eq!(GraphDocument::from_graph(&graph), document());
    }

    #[test]
    fn test_json_shape() {
        let json = document().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["vertices"][0]["init_sync"], 2);
        assert!(value["vertices"][0].get("absorbing").is_none());
        assert_eq!(value["vertices"][2]["absorbing"], true);

        let parsed = GraphDocument::from_json(
            r#"{"vertices":[{"id":0,"init_sync":1}],"edges":[]}"#,
        )
        .unwrap();
        assert!(!parsed.strict);
        assert_eq!(parsed.vertices.len(), 1);
        assert!(GraphDocument::from_json("{").is_err());
    }

    #[test]
    fn test_invalid_records_rejected() {
        let mut doc = document();
        doc.vertices[0].init_sync = 0;
        assert_eq!(
            doc.to_graph().unwrap_err(),
            EngineError::invalid_threshold(VertexId(0), 0)
        );

        let mut doc = document();
        doc.strict = true;
        doc.edges.push(doc.edges[0].clone());
        assert_eq!(
            doc.to_graph().unwrap_err(),
            EngineError::duplicate_edge(VertexId(0), VertexId(1))
        );
    }

    #[test]
    fn test_starting_edges_import_export() {
        let graph = document().to_graph().unwrap();
        let mut sim = Simulation::new(graph, EngineConfig::default()).unwrap();

        let records = vec![
            StartingEdgeRecord::blue(EdgeId(0), 2),
            StartingEdgeRecord {
                edge_id: EdgeId(1),
                blue_dots_count: 0,
                green_dots_count: 3,
            },
        ];
        import_starting_edges(&mut sim, &records).unwrap();
        assert_eq!(export_starting_edges(&sim), records);

        let err = import_starting_edges(&mut sim, &[StartingEdgeRecord::blue(EdgeId(7), 1)]);
        assert_eq!(err, Err(EngineError::UnknownEdge(EdgeId(7))));
        assert_eq!(export_starting_edges(&sim), records);
    }

    #[test]
    fn test_starting_edge_json_names() {
        let json = serde_json::to_value(StartingEdgeRecord::blue(EdgeId(4), 1)).unwrap();
        assert_eq!(json["edgeID"], 4);
        assert_eq!(json["blueDotsCount"], 1);
        assert_eq!(json["greenDotsCount"], 0);

        let parsed: StartingEdgeRecord = serde_json::from_str(r#"{"edgeID":2,"greenDotsCount":5}"#).unwrap();
        assert_eq!(parsed.blue_dots_count, 0);
        assert_eq!(parsed.green_dots_count, 5);
    }
}
