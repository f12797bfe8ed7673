#![doc = "release-mirror-core: core pipeline for release-mirror."]

//! This crate contains the mirror pipeline: listing remote release directories,
//! streaming their files into a bucket, regenerating index pages, and re-running on
//! config changes. Concrete storage adapters and credential handling live in the
//! `release-mirror` binary crate.
//!
//! # Usage
//! Build a [`synchronise::Mirror`] from a validated [`config::MirrorConfig`], an
//! [`contract::ObjectSink`] and an [`index::IndexRenderer`], then call
//! [`synchronise::synchronise`].

pub mod config;
pub mod contract;
pub mod index;
pub mod listing;
pub mod synchronise;
pub mod transfer;
pub mod version;
pub mod watch;
