//! End-to-end pipeline tests with in-memory doubles.

mod doubles;
