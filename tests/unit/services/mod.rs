pub mod config_service_test;
