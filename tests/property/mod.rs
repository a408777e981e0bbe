//! Property-based tests for clip set and frame set invariants
