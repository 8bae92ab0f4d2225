//! Tunables for the proof construction and verification core.

use serde::{Deserialize, Serialize};

/// Configuration consumed by [`crate::closure`] and, in future, other bounded
/// traversals. Mirrors the nested `config` module convention used throughout
/// this lineage (e.g. `wsv::config`, `sumeragi::config`): a plain
/// `Deserialize`/`Default` struct, no process-wide globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Configuration {
    /// Total number of nodes known to the network. Bounds the size of the
    /// chain set [`crate::closure::append_chains`] may accumulate.
    pub nr_of_nodes: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self { nr_of_nodes: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_a_single_node() {
        assert_eq!(Configuration::default().nr_of_nodes, 1);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = Configuration { nr_of_nodes: 12 };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
