#![doc = "listing-depot-core: compiles JSON listings and publishes them incrementally to a depot."]

//! This crate contains the listing pipeline and everything it needs to talk to a depot.
//! The CLI crate only parses arguments, loads configuration and wires these pieces up.
//!
//! # Pipeline
//! 1. Register listings with a [`compile::ListingCompiler`] (directly or through
//!    [`assemble::register_loader_listings`]).
//! 2. [`compile::ListingCompiler::finalize`] joins every listing and writes `index`.
//! 3. [`synchronise::synchronise`] uploads what changed to a [`contract::Depot`] and
//!    publishes the new depot index.

pub mod assemble;
pub mod compile;
pub mod compress;
pub mod config;
pub mod contract;
pub mod descriptor;
pub mod local_depot;
pub mod remote_depot;
pub mod safe_path;
pub mod synchronise;
