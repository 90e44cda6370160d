pub mod control_plane_test;
