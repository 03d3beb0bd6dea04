pub mod wyhash;
