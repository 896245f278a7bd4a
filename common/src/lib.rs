//! Shared configuration for the Shelvery binaries and libraries.

pub mod config;
