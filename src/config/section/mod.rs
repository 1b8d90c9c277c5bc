//! Configuration section definitions.
//!
//! Each module corresponds to a section in `preview.toml`:
//!
//! | Module       | TOML Section    | Purpose                              |
//! |--------------|-----------------|--------------------------------------|
//! | `bundle`     | `[bundle]`      | Rebuild timing, minify, conventions  |
//! | `serve`      | `[serve]`       | HTTP and WebSocket endpoints         |
//! | `styleguide` | `[styleguide]`  | Startup selection                    |

mod bundle;
mod serve;
mod styleguide;

pub use bundle::BundleConfig;
pub use serve::{DEFAULT_WS_PORT, ServeConfig};
pub use styleguide::StyleguideConfig;
