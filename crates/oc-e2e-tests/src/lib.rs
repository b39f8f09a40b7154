//! End-to-end tests for the `$oc` device client live under `tests/`.
