#![warn(clippy::pedantic)]

extern crate proc_macro;

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{ItemFn, Stmt, parse::Parse, parse_macro_input, parse_quote};

/// Resolution used when reporting how long a traced function ran for.
#[derive(PartialEq, Eq, Clone, Copy, Default)]
enum Precision {
    #[default]
    Nanos,
    Micros,
    Millis,
    Seconds,
}

impl Precision {
    const fn unit(self) -> &'static str {
        match self {
            Self::Nanos => "ns",
            Self::Micros => "us",
            Self::Millis => "ms",
            Self::Seconds => "s",
        }
    }

    /// Expression reading `__elapsed` (a `Duration`) at this precision
    fn reading(self) -> syn::Expr {
        match self {
            Self::Nanos => parse_quote!(__elapsed.as_nanos()),
            Self::Micros => parse_quote!(__elapsed.as_micros()),
            Self::Millis => parse_quote!(__elapsed.as_millis()),
            Self::Seconds => parse_quote!(__elapsed.as_secs()),
        }
    }

    fn named(value: &str) -> Option<Self> {
        match value {
            "ns" | "nano" | "nanos" | "nanoseconds" => Some(Self::Nanos),
            "us" | "micro" | "micros" | "microseconds" => Some(Self::Micros),
            "ms" | "milli" | "millis" | "milliseconds" => Some(Self::Millis),
            "s" | "sec" | "secs" | "seconds" => Some(Self::Seconds),
            _ => None,
        }
    }
}

impl Parse for Precision {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        if !input.peek(syn::token::Paren) {
            return Ok(Self::default());
        }

        let content;
        let _ = syn::parenthesized!(content in input);
        let _ = content.parse::<keywords::precision>()?;
        let _ = content.parse::<syn::Token![=]>()?;
        let literal = content.parse::<syn::LitStr>()?;

        Self::named(&literal.value()).ok_or_else(|| {
            syn::Error::new(
                literal.span(),
                "unknown precision, expected one of `ns`, `us`, `ms` or `s`",
            )
        })
    }
}

mod keywords {
    syn::custom_keyword!(timing);
    syn::custom_keyword!(precision);
    syn::custom_keyword!(instrument);
}

#[derive(Default)]
struct Attributes {
    timing: Option<Precision>,
    instrument: Option<TokenStream>,
    unrecognised: Vec<syn::Error>,
}

impl Attributes {
    /// Unrecognised arguments are surfaced as deprecation warnings rather than
    /// hard errors, so a typo never breaks the build of the annotated crate.
    fn warnings(&self) -> TokenStream {
        let warnings = self.unrecognised.iter().map(|err| {
            let msg = syn::LitStr::new(&format!("traced: ignoring input, {err}"), err.span());

            quote_spanned! {err.span()=>
                #[warn(deprecated)]
                {
                    #[deprecated(since = "never", note = #msg)]
                    const TRACED_WARNING: () = ();
                    let _ = TRACED_WARNING;
                }
            }
        });

        quote! { { #(#warnings)* } }
    }
}

impl Parse for Attributes {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut attributes = Self::default();

        while !input.is_empty() {
            let lookahead = input.lookahead1();

            if lookahead.peek(keywords::timing) {
                if attributes.timing.is_some() {
                    return Err(input.error("`timing` may only be given once"));
                }

                let _ = input.parse::<keywords::timing>()?;
                attributes.timing = Some(input.parse()?);
            } else if lookahead.peek(keywords::instrument) {
                if attributes.instrument.is_some() {
                    return Err(input.error("`instrument` may only be given once"));
                }

                let _ = input.parse::<keywords::instrument>()?;
                if input.peek(syn::token::Paren) {
                    let content;
                    let _ = syn::parenthesized!(content in input);
                    attributes.instrument = Some(content.parse()?);
                } else {
                    attributes.instrument = Some(TokenStream::new());
                }
            } else if lookahead.peek(syn::Token![,]) {
                let _ = input.parse::<syn::Token![,]>()?;
            } else {
                attributes.unrecognised.push(lookahead.error());
                let _ = input.parse::<proc_macro2::TokenTree>();
            }
        }

        Ok(attributes)
    }
}

/// Emits `tracing::trace!` events when the attributed function is entered and
/// when it returns.
///
/// ```ignore
/// #[traced(instrument(level = tracing::Level::DEBUG, skip(self)), timing(precision = "ms"))]
/// async fn dispatch(&self, id: YoId) -> Result<Outcome, DeliveryError> { ... }
/// ```
///
/// - `instrument(...)` forwards its arguments to `#[tracing::instrument]`
/// - `timing` appends the elapsed time to the exit event (`ns` by default)
///
/// The annotated crate must have `tracing` in scope.
///
/// # Panics
///
/// When applied to anything other than a function.
#[proc_macro_attribute]
pub fn traced(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let args = parse_macro_input!(args as Attributes);
    let warnings = args.warnings();

    let mut item_fn = parse_macro_input!(item as ItemFn);

    item_fn
        .attrs
        .push(parse_quote! { #[allow(clippy::items_after_statements)] });

    if let Some(fields) = &args.instrument {
        item_fn
            .attrs
            .push(parse_quote! { #[tracing::instrument(#fields)] });
    }

    let name = item_fn.sig.ident.to_string();
    let on_exit: Stmt = match args.timing {
        None => parse_quote! { tracing::trace!("OnExit: {}", #name); },
        Some(precision) => {
            let reading = precision.reading();
            let unit = precision.unit();
            parse_quote! {
                tracing::trace!("OnExit: {} ({} {} elapsed)", #name, #reading, #unit);
            }
        }
    };

    let guard: Vec<Stmt> = parse_quote! {
        struct __Traced {
            started: std::time::Instant,
        }

        impl __Traced {
            fn enter() -> Self {
                #warnings

                tracing::trace!("OnEnter: {}", #name);
                Self {
                    started: std::time::Instant::now(),
                }
            }
        }

        impl std::ops::Drop for __Traced {
            fn drop(&mut self) {
                let __elapsed = self.started.elapsed();
                let _ = __elapsed;
                #on_exit
            }
        }

        let __traced = __Traced::enter();
    };

    for (offset, stmt) in guard.into_iter().enumerate() {
        item_fn.block.stmts.insert(offset, stmt);
    }

    proc_macro::TokenStream::from(quote! { #item_fn })
}
