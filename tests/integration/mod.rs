//! Integration tests that exercise linked containers, datasets and fitting
//! together through the workspace.

mod workspace_tests;
