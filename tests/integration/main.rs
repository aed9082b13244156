//! Integration tests driving `RaceMonitor` against in-memory collaborators.

mod mock_source;
mod simulation;
