// Snowflake-style ID generator for content items, comments and users
// 64-bit ID format: [timestamp:42][node_id:10][sequence:12]

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, AppResult};

const NODE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Generates ids that are unique per node and strictly increasing within a
/// process, so insertion order can be recovered from the id alone.
#[derive(Debug)]
pub struct ContentIdGenerator {
    node_id: u16,
    state: Mutex<GeneratorState>,
}

impl ContentIdGenerator {
    pub fn new(node_id: u16) -> AppResult<Self> {
        if node_id > MAX_NODE_ID {
            return Err(AppError::IdGenerationError(format!(
                "Node ID must be at most {}, got {}",
                MAX_NODE_ID, node_id
            )));
        }

        Ok(Self {
            node_id,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    /// Generate the next id
    pub fn next_id(&self) -> AppResult<i64> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::IdGenerationError("ID generator lock poisoned".to_string()))?;

        let mut now = current_millis().max(state.last_timestamp);

        if now == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond: borrow the next one.
                now += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = now;

        let id = ((now & 0x3FF_FFFF_FFFF) << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | state.sequence;

        Ok(id as i64)
    }

    /// Extract node ID from a generated ID
    pub fn extract_node_id(id: i64) -> u16 {
        (((id as u64) >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16
    }

    /// Extract timestamp from a generated ID
    pub fn extract_timestamp(id: i64) -> u64 {
        (id as u64) >> (NODE_BITS + SEQUENCE_BITS)
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let generator = ContentIdGenerator::new(123).unwrap();

        let ids: Vec<i64> = (0..5000).map(|_| generator.next_id().unwrap()).collect();

        // Strictly increasing, hence unique
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| *id > 0));
        assert!(ids
            .iter()
            .all(|id| ContentIdGenerator::extract_node_id(*id) == 123));
    }

    #[test]
    fn test_node_extraction() {
        let generator = ContentIdGenerator::new(500).unwrap();
        let id = generator.next_id().unwrap();

        assert_eq!(ContentIdGenerator::extract_node_id(id), 500);
        assert_eq!(generator.node_id(), 500);
        assert!(ContentIdGenerator::extract_timestamp(id) > 0);
    }

    #[test]
    fn test_rejects_out_of_range_node() {
        assert!(ContentIdGenerator::new(1024).is_err());
    }
}
