//! The nested representation handed to the UI by `/file-tree`.
//!
//! Field names here are the wire format and the frontend depends on them, so
//! don't rename things without updating the UI.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerNode {
    pub customer_name: String,
    pub parts: Vec<PartNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartNode {
    pub part_name: String,
    pub part_revisions: Vec<PartRevisionNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRevisionNode {
    pub part_revision_name: String,
    /// Files joined to the revision itself (its geometry) rather than to a
    /// process run.  Omitted from the JSON when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<FileRef>,
    pub trials: Vec<TrialNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialNode {
    pub trial_uuid: String,
    /// `null` means the trial outcome is unknown, which is not the same thing
    /// as a failure.
    pub trial_status: Option<bool>,
    pub process_runs: Vec<ProcessRunNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRunNode {
    pub run_type: String,
    pub files: Vec<FileRef>,
}

/// A file attached to a process run or a part revision.  `location` is the path relative to the
/// archive's `files/` directory and is what `/file?path=` expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub location: String,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
}

impl CustomerNode {
    pub fn new(customer_name: &str) -> Self {
        CustomerNode {
            customer_name: customer_name.to_string(),
            parts: Vec::new(),
        }
    }
}

impl PartNode {
    pub fn new(part_name: &str) -> Self {
        PartNode {
            part_name: part_name.to_string(),
            part_revisions: Vec::new(),
        }
    }
}

impl PartRevisionNode {
    pub fn new(part_revision_name: &str) -> Self {
        PartRevisionNode {
            part_revision_name: part_revision_name.to_string(),
            geometry: Vec::new(),
            trials: Vec::new(),
        }
    }
}

impl TrialNode {
    pub fn new(trial_uuid: &str, trial_status: Option<bool>) -> Self {
        TrialNode {
            trial_uuid: trial_uuid.to_string(),
            trial_status,
            process_runs: Vec::new(),
        }
    }
}

impl ProcessRunNode {
    pub fn new(run_type: &str) -> Self {
        ProcessRunNode {
            run_type: run_type.to_string(),
            files: Vec::new(),
        }
    }
}

/// Node counts per level, mainly for logging how big a tree we just built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub customers: usize,
    pub parts: usize,
    pub part_revisions: usize,
    pub trials: usize,
    pub process_runs: usize,
    pub files: usize,
}

impl TreeStats {
    pub fn of(forest: &[CustomerNode]) -> Self {
        let mut stats = TreeStats {
            customers: forest.len(),
            ..Default::default()
        };
        for customer in forest {
            stats.parts += customer.parts.len();
            for part in &customer.parts {
                stats.part_revisions += part.part_revisions.len();
                for revision in &part.part_revisions {
                    stats.files += revision.geometry.len();
                    stats.trials += revision.trials.len();
                    for trial in &revision.trials {
                        stats.process_runs += trial.process_runs.len();
                        for run in &trial.process_runs {
                            stats.files += run.files.len();
                        }
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_chain() -> Vec<CustomerNode> {
        let mut run = ProcessRunNode::new("sim");
        run.files.push(FileRef {
            location: "a/1.txt".to_string(),
            file_type: Some("log".to_string()),
        });
        let mut trial = TrialNode::new("T1", None);
        trial.process_runs.push(run);
        let mut revision = PartRevisionNode::new("R1");
        revision.trials.push(trial);
        let mut part = PartNode::new("P1");
        part.part_revisions.push(revision);
        let mut customer = CustomerNode::new("A");
        customer.parts.push(part);
        vec![customer]
    }

    #[test]
    fn test_wire_format() {
        insta::assert_json_snapshot!(single_chain(), @r###"
        [
          {
            "customer_name": "A",
            "parts": [
              {
                "part_name": "P1",
                "part_revisions": [
                  {
                    "part_revision_name": "R1",
                    "trials": [
                      {
                        "trial_uuid": "T1",
                        "trial_status": null,
                        "process_runs": [
                          {
                            "run_type": "sim",
                            "files": [
                              {
                                "location": "a/1.txt",
                                "type": "log"
                              }
                            ]
                          }
                        ]
                      }
                    ]
                  }
                ]
              }
            ]
          }
        ]
        "###);
    }

    #[test]
    fn test_revision_geometry_on_the_wire() {
        let mut revision = PartRevisionNode::new("R2");
        revision.geometry.push(FileRef {
            location: "geometry/p1.step".to_string(),
            file_type: Some("step".to_string()),
        });
        insta::assert_json_snapshot!(revision, @r###"
        {
          "part_revision_name": "R2",
          "geometry": [
            {
              "location": "geometry/p1.step",
              "type": "step"
            }
          ],
          "trials": []
        }
        "###);

        let parsed: PartRevisionNode =
            serde_json::from_str(r#"{"part_revision_name": "R1", "trials": []}"#).unwrap();
        assert_eq!(parsed, PartRevisionNode::new("R1"));
    }

    #[test]
    fn test_tree_stats() {
        let mut forest = single_chain();
        forest[0].parts[0].part_revisions[0].geometry.push(FileRef {
            location: "geometry/p1.step".to_string(),
            file_type: None,
        });
        forest.push(CustomerNode::new("B"));
        assert_eq!(
            TreeStats::of(&forest),
            TreeStats {
                customers: 2,
                parts: 1,
                part_revisions: 1,
                trials: 1,
                process_runs: 1,
                files: 2,
            }
        );
        assert_eq!(TreeStats::of(&[]), TreeStats::default());
    }
}
