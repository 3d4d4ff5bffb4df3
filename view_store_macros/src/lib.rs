mod read_model;

use proc_macro::TokenStream;

/// Derive macro for implementing the `ReadModel` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize, ReadModel)]
/// #[readmodel(collection = "counter_views")]
/// pub struct CounterView {
///     #[readmodel(id)]
///     pub id: String,
///     #[readmodel(index)]
///     pub owner: String,
///     pub value: i32,
/// }
/// ```
///
/// - `#[readmodel(collection = "...")]` sets the collection name, which
///   prefixes the view id. Defaults to the snake_case struct name + "s".
/// - `#[readmodel(id)]` marks the `String` field used as the identifier.
///   Defaults to a field named `id`.
/// - `#[readmodel(index)]` adds the field to `INDEXED_FIELDS`. The Rust field
///   name is used, so avoid `#[serde(rename)]` on indexed fields.
#[proc_macro_derive(ReadModel, attributes(readmodel))]
pub fn derive_read_model(input: TokenStream) -> TokenStream {
    read_model::derive_read_model(input)
}
