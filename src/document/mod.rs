/*!
 * String table document handling.
 *
 * - `codec`: splits a document into a skeleton and text units, and puts
 *   translated units back without touching any other byte
 * - `model`: the skeleton and text unit types
 */

pub mod codec;
pub mod model;

pub use codec::{reassemble, StringTableCodec};
pub use model::{ExtractedDocument, Skeleton, TextUnit, UnitKind, UnitLocator};
