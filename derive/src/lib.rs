use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod format;

#[proc_macro_derive(Format, attributes(format, field))]
pub fn derive_format(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match format::expand_format(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}
