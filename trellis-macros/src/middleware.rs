//! Middleware attribute.
//!
//! This module contains:
//! - `#[middleware]` - Attribute macro turning an async fn into a `Middleware` unit struct

use proc_macro::TokenStream;
use quote::quote;
use syn::{FnArg, Ident, ItemFn, LitStr, Token, Type, parse::Parse, parse_macro_input};

/// Arguments for the `#[middleware]` macro.
pub(crate) struct MiddlewareArgs {
    pub name: Option<String>,
}

impl Parse for MiddlewareArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut name = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "name" => {
                    let lit: LitStr = input.parse()?;
                    name = Some(lit.value());
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(MiddlewareArgs { name })
    }
}

/// Implementation of the `#[middleware]` macro.
///
/// ```rust,ignore
/// #[trellis::middleware]
/// async fn require_user(ctx: &mut Request, next: Next<'_, Request>) -> Result<(), BoxError> {
///     if !ctx.params().contains("user") {
///         return Err("unauthorized".into());
///     }
///     next.run(ctx).await
/// }
///
/// router.use_middleware([require_user.shared()])?;
/// ```
pub fn middleware_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as MiddlewareArgs);
    let input = parse_macro_input!(item as ItemFn);

    let fn_name = &input.sig.ident;
    let fn_vis = &input.vis;
    let fn_block = &input.block;
    let fn_inputs = &input.sig.inputs;
    let fn_output = &input.sig.output;

    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(&input.sig.fn_token, "Middleware function must be async")
            .to_compile_error()
            .into();
    }

    if fn_inputs.len() != 2 {
        return syn::Error::new_spanned(
            fn_inputs,
            "Middleware function must take exactly two arguments: fn(ctx: &mut C, next: Next<'_, C>)",
        )
        .to_compile_error()
        .into();
    }

    let context_type = match fn_inputs.first() {
        Some(FnArg::Typed(pat_type)) => match &*pat_type.ty {
            Type::Reference(type_ref) if type_ref.mutability.is_some() => &type_ref.elem,
            other => {
                return syn::Error::new_spanned(
                    other,
                    "Middleware context argument must be a mutable reference (&mut C)",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(
                fn_inputs,
                "Middleware function must not take self",
            )
            .to_compile_error()
            .into();
        }
    };

    let struct_name = if let Some(ref custom_name) = args.name {
        Ident::new(custom_name, fn_name.span())
    } else {
        fn_name.clone()
    };

    let expanded = quote! {
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, Default)]
        #[doc = concat!("Middleware generated from `", stringify!(#fn_name), "`")]
        #fn_vis struct #struct_name;

        impl #struct_name {
            #[doc(hidden)]
            async fn __call(#fn_inputs) #fn_output #fn_block
        }

        impl ::trellis::Middleware<#context_type> for #struct_name {
            fn handle<'a>(
                &'a self,
                ctx: &'a mut #context_type,
                next: ::trellis::Next<'a, #context_type>,
            ) -> ::trellis::BoxFuture<'a, ::core::result::Result<(), ::trellis::BoxError>> {
                ::std::boxed::Box::pin(async move {
                    #struct_name::__call(ctx, next)
                        .await
                        .map_err(::core::convert::Into::<::trellis::BoxError>::into)
                })
            }
        }
    };

    TokenStream::from(expanded)
}
