//! `#[traced]`: wrap a synchronous function body in a `tracing` span.
//!
//! ```ignore
//! use tracing_macros::traced;
//!
//! #[traced("normalize", fields(format = ?kind, bytes = bytes.len()))]
//! fn normalize(bytes: &[u8], kind: ImageKind) -> Result<NormalizedImage, PreprocessError> {
//!     // body runs inside the `normalize` span
//! }
//! ```
//!
//! The span guard is held for the whole body, so the attribute is rejected on
//! `async fn`: an entered guard must not live across an `.await`. Async code
//! should use `tracing::Instrument` instead.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Expr, Ident, ItemFn, LitStr, Token,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

/// Arguments for the `#[traced]` attribute.
///
/// - `#[traced("span_name")]`
/// - `#[traced("span_name", level = "debug")]`
/// - `#[traced("span_name", fields(key = value, other))]`
struct TracedArgs {
    span_name: LitStr,
    level: SpanLevel,
    fields: Vec<FieldArg>,
}

#[derive(Clone, Copy)]
enum SpanLevel {
    Trace,
    Debug,
    Info,
}

struct FieldArg {
    name: Ident,
    value: Option<FieldValue>,
}

/// `key = expr`, `key = ?expr` or `key = %expr`, as in `tracing::span!`.
struct FieldValue {
    sigil: Option<TokenStream2>,
    expr: Expr,
}

impl Parse for TracedArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let span_name: LitStr = input.parse()?;

        let mut level = SpanLevel::Info;
        let mut fields = Vec::new();

        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;

            if input.is_empty() {
                break;
            }

            let ident: Ident = input.parse()?;

            if ident == "level" {
                input.parse::<Token![=]>()?;
                let lit: LitStr = input.parse()?;
                level = match lit.value().as_str() {
                    "trace" => SpanLevel::Trace,
                    "debug" => SpanLevel::Debug,
                    "info" => SpanLevel::Info,
                    other => {
                        return Err(syn::Error::new_spanned(
                            &lit,
                            format!("unsupported span level `{}`; use trace, debug or info", other),
                        ));
                    }
                };
            } else if ident == "fields" {
                let content;
                syn::parenthesized!(content in input);
                let field_list: Punctuated<FieldArg, Token![,]> =
                    content.parse_terminated(FieldArg::parse, Token![,])?;
                fields = field_list.into_iter().collect();
            } else {
                return Err(syn::Error::new_spanned(
                    &ident,
                    "expected `level = \"...\"` or `fields(...)`",
                ));
            }
        }

        Ok(TracedArgs {
            span_name,
            level,
            fields,
        })
    }
}

impl Parse for FieldArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: Ident = input.parse()?;

        let value = if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            let sigil = if input.peek(Token![?]) {
                input.parse::<Token![?]>()?;
                Some(quote! { ? })
            } else if input.peek(Token![%]) {
                input.parse::<Token![%]>()?;
                Some(quote! { % })
            } else {
                None
            };
            Some(FieldValue {
                sigil,
                expr: input.parse()?,
            })
        } else {
            None
        };

        Ok(FieldArg { name, value })
    }
}

/// Instruments a synchronous function with a `tracing` span.
///
/// - `span_name` (required): string literal naming the span
/// - `level = "trace" | "debug" | "info"` (optional, default `info`)
/// - `fields(...)` (optional): span fields; a bare name records the
///   parameter of the same name
#[proc_macro_attribute]
pub fn traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TracedArgs);
    let input_fn = parse_macro_input!(item as ItemFn);

    match generate_traced_fn(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_traced_fn(args: TracedArgs, input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input_fn;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "#[traced] does not support async fn; use tracing::Instrument",
        ));
    }

    let span_name = &args.span_name;
    let fn_body = &block.stmts;

    let level = match args.level {
        SpanLevel::Trace => quote! { tracing::Level::TRACE },
        SpanLevel::Debug => quote! { tracing::Level::DEBUG },
        SpanLevel::Info => quote! { tracing::Level::INFO },
    };

    let span_creation = if args.fields.is_empty() {
        quote! {
            let __traced_span = tracing::span!(#level, #span_name);
        }
    } else {
        let field_tokens = build_field_tokens(&args.fields);
        quote! {
            let __traced_span = tracing::span!(#level, #span_name, #field_tokens);
        }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #span_creation
            let __traced_guard = __traced_span.enter();

            #(#fn_body)*
        }
    };

    Ok(output)
}

fn build_field_tokens(fields: &[FieldArg]) -> TokenStream2 {
    let field_exprs: Vec<TokenStream2> = fields
        .iter()
        .map(|f| {
            let name = &f.name;
            match &f.value {
                Some(FieldValue { sigil, expr }) => quote! { #name = #sigil #expr },
                None => quote! { #name = #name },
            }
        })
        .collect();

    quote! { #(#field_exprs),* }
}
