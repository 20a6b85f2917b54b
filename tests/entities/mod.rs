//! Integration tests for the entity graph
//!
//! These tests drive containers through their public API only.

// Naming, identity, cycles and evaluation order
mod container_tests;

// Edit records and change notifications
mod edit_tests;

// Records and JSON round trips
mod persistence_tests;
