use sha2::{Digest, Sha256};

use crate::geometry::Vec2;

use super::runner::RunStatus;

/// Observable runner state after one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySample {
    pub status: RunStatus,
    pub stage_index: usize,
    pub path: Vec<Vec2>,
    pub path_index: usize,
}

/// Order-sensitive SHA-256 over every sample of a run.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryDigest {
    hasher: Sha256,
    samples: usize,
}

impl TrajectoryDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: &TrajectorySample) {
        self.hasher.update([sample.status as u8]);
        self.hasher.update((sample.stage_index as u64).to_le_bytes());
        self.hasher.update((sample.path_index as u64).to_le_bytes());
        self.hasher.update((sample.path.len() as u64).to_le_bytes());
        for point in &sample.path {
            self.hasher.update(point.x.to_bits().to_le_bytes());
            self.hasher.update(point.y.to_bits().to_le_bytes());
        }
        self.samples += 1;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn finish_hex(&self) -> String {
        let bytes: [u8; 32] = self.hasher.clone().finalize().into();
        to_hex_lower(&bytes)
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
