use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, DeriveInput, Error, Ident, LitInt, LitStr, Path, Result, Token,
    parse::{Parse, ParseStream},
    spanned::Spanned,
};

pub(crate) fn expand_format(input: &DeriveInput) -> Result<TokenStream> {
    let mut format = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("format")) {
        let existing = format.replace(attr.parse_args::<FormatAttribute>()?);

        if existing.is_some() {
            Err(Error::new(
                attr.span(),
                "The `format` attribute may only be given once.",
            ))?
        }
    }

    let Some(FormatAttribute {
        name,
        header,
        validate,
        delimited,
    }) = format
    else {
        Err(Error::new(
            input.span(),
            "`Format` requires a `#[format(name = ..., header = ..., validate = ...)]` attribute.",
        ))?
    };

    let fields = input
        .attrs
        .iter()
        .filter(|a| a.path().is_ident("field"))
        .map(Attribute::parse_args::<FieldAttribute>)
        .collect::<Result<Vec<_>>>()?;

    let fields = fields.iter().map(|FieldAttribute { header, validate }| {
        quote! {
            .with_field_validator(::tagscan::sans::field::FieldValidator::new(#header, #validate))
        }
    });

    let delimited = delimited.map(|parser| quote! { .with_delimited(#parser) });

    let ident = &input.ident;
    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::tagscan::Format for #ident #type_generics #where_clause {
            fn descriptor() -> ::tagscan::FormatDescriptor {
                ::tagscan::FormatDescriptor::new(#name, #header, #validate)
                    #(#fields)*
                    #delimited
            }
        }
    };

    Ok(expanded.into())
}

#[derive(Debug)]
struct FormatAttribute {
    name: LitStr,
    header: LitInt,
    validate: Path,
    delimited: Option<Path>,
}

impl Parse for FormatAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let span = input.span();

        let mut name = None;
        let mut header = None;
        let mut validate = None;
        let mut delimited = None;

        while let Some(key) = parse_key(input)? {
            match key.to_string().as_str() {
                "name" => name = Some(input.parse()?),
                "header" => header = Some(input.parse()?),
                "validate" => validate = Some(input.parse()?),
                "delimited" => delimited = Some(input.parse()?),
                _ => Err(Error::new(
                    key.span(),
                    "Expected one of `name`, `header`, `validate` or `delimited`.",
                ))?,
            }
            parse_separator(input)?;
        }

        Ok(Self {
            name: name.ok_or_else(|| Error::new(span, "Missing `name`."))?,
            header: header.ok_or_else(|| Error::new(span, "Missing `header`."))?,
            validate: validate.ok_or_else(|| Error::new(span, "Missing `validate`."))?,
            delimited,
        })
    }
}

#[derive(Debug)]
struct FieldAttribute {
    header: LitInt,
    validate: Path,
}

impl Parse for FieldAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let span = input.span();

        let mut header = None;
        let mut validate = None;

        while let Some(key) = parse_key(input)? {
            match key.to_string().as_str() {
                "header" => header = Some(input.parse()?),
                "validate" => validate = Some(input.parse()?),
                _ => Err(Error::new(
                    key.span(),
                    "Expected one of `header` or `validate`.",
                ))?,
            }
            parse_separator(input)?;
        }

        Ok(Self {
            header: header.ok_or_else(|| Error::new(span, "Missing `header`."))?,
            validate: validate.ok_or_else(|| Error::new(span, "Missing `validate`."))?,
        })
    }
}

/// Parse `key =`, or nothing at the end of the attribute.
fn parse_key(input: ParseStream) -> Result<Option<Ident>> {
    if input.is_empty() {
        return Ok(None);
    }

    let key = input.parse::<Ident>()?;
    input.parse::<Token![=]>()?;

    Ok(Some(key))
}

fn parse_separator(input: ParseStream) -> Result<()> {
    if !input.is_empty() {
        input.parse::<Token![,]>()?;
    }

    Ok(())
}
