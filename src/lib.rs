//! mutascan: serves a mutant/wild-type detection model over HTTP, plus the
//! config migration, cache path and image geometry helpers around it.

pub mod module;
