mod error_containment_tests;
mod memory_backend_tests;
