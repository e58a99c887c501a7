//! pc-keycode: Abstract key codes and names for PC-style keyboards.
//!
//! - `Key`: Enum of every key the control channel can address, carrying the
//!   XT set-1 make code (extended keys use the 0x80-or'd form).
//! - Name table: `Key::parse` (case-sensitive canonical names and aliases),
//!   `all_names`, `suggest`, and `display_name`.
//! - `keysym`: lowering of US-ASCII characters to `(Key, shift)` pairs.
//!
//! Name matching is deliberately case-sensitive: it removes collisions such
//! as `UP` the verb vs. `Up` the key, and forces scripts into one canonical
//! spelling. `suggest` exists so callers can still produce a precise error
//! when only the case is wrong.
#![warn(missing_docs)]

mod key;
pub use key::Key;

mod names;
pub use names::{all_names, display_name, suggest};

pub mod keysym;
pub use keysym::KeyPress;
