//! Terminal output for the CLI
//!
//! Uses `cliclack` for styled logs and spinners in interactive terminals,
//! with plain `[OK]`/`[FAIL]` lines in CI and other non-interactive
//! environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use skiff::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! ui::intro(&ctx, "skiff deploy");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Resolving dependencies...");
//! // ... do work ...
//! spinner.stop("Resolved 3 projects");
//!
//! ui::step_ok_detail(&ctx, "[api] built image api", "3f2a9c01b7d4");
//! ui::outro_success(&ctx, "Done");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, remark, section, step_blocked,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn,
};
pub use progress::TaskSpinner;
