//! Checkout step with workspace hygiene around it.
//!
//! The hosting runtime runs the same binary twice per job: a main phase that
//! checks out sources, and a post phase at job end that cleans up. The two
//! processes share nothing but the persisted job state.
//!
//! - **[`core`]**: Pure types and state encoding. No I/O.
//! - **[`io`]**: Filesystem, git, job log, and state store adapters behind
//!   traits so the orchestrators can be tested with fakes.
//!
//! Orchestration modules ([`run_main`], [`run_post`]) implement the two phases
//! on top of [`phase`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod phase;
pub mod run_main;
pub mod run_post;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
