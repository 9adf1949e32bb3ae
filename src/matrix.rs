//! Matrix request/response payloads and distance mapping.

use serde::{Deserialize, Serialize};

use crate::coordinate::Coord;
use crate::error::Error;

/// How the origin row is selected in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Full matrix; the first row's entry 0 is the origin-to-origin distance.
    #[default]
    Implicit,
    /// `sources: [0]`, `destinations: [1..N]`; the first row holds exactly
    /// the destination distances.
    Explicit,
}

/// Body of one matrix request. The origin is always location 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRequest {
    pub locations: Vec<[f64; 2]>,
    pub metrics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<usize>>,
}

impl MatrixRequest {
    pub fn new(origin: Coord, destinations: &[Coord], mode: IndexMode) -> Self {
        let locations = std::iter::once(origin)
            .chain(destinations.iter().copied())
            .map(|coord| coord.as_pair())
            .collect();

        let (sources, destination_indices) = match mode {
            IndexMode::Implicit => (None, None),
            IndexMode::Explicit => (Some(vec![0]), Some((1..=destinations.len()).collect())),
        };

        Self {
            locations,
            metrics: vec!["distance".to_string()],
            sources,
            destinations: destination_indices,
        }
    }

    /// Number of destinations carried, excluding the origin.
    pub fn destination_count(&self) -> usize {
        self.locations.len().saturating_sub(1)
    }
}

/// Decoded matrix response. Cells are metres; `None` means no route.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixResponse {
    pub distances: Vec<Vec<Option<f64>>>,
}

impl MatrixResponse {
    pub fn from_json(body: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(body)
            .map_err(|err| Error::MalformedResponse(format!("unexpected body shape: {err}")))
    }

    /// Origin-row distances aligned with the chunk's destination order.
    ///
    /// The length must equal `expected`; a mismatch means the response does
    /// not belong to the request and is reported as malformed.
    pub fn distances_for(&self, expected: usize, mode: IndexMode) -> Result<Vec<Option<f64>>, Error> {
        let first = self
            .distances
            .first()
            .ok_or_else(|| Error::MalformedResponse("distances matrix is empty".to_string()))?;

        let aligned = match mode {
            IndexMode::Implicit => first.get(1..).unwrap_or_default(),
            IndexMode::Explicit => first.as_slice(),
        };

        if aligned.len() != expected {
            return Err(Error::MalformedResponse(format!(
                "expected {} distances, got {}",
                expected,
                aligned.len()
            )));
        }

        Ok(aligned.to_vec())
    }
}

/// Metres to kilometres rounded to two decimals.
///
/// Rounds the stored binary value of `meters / 1000`, so `1005 m` is
/// `1.00 km` (1.005 is held as 1.00499...).
pub fn meters_to_km(meters: f64) -> f64 {
    let km = meters / 1000.0;
    format!("{:.2}", km).parse().unwrap_or(km)
}
