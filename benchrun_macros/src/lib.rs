use proc_macro::TokenStream;
use quote::quote;
use syn::{Error, FnArg, ItemFn, parse_macro_input};

extern crate proc_macro;

/// Turn an `async fn(ctx: &mut RunContext)` into a unit struct of the same name
/// implementing `benchrun::Workload`.
///
/// ```rust,ignore
/// #[workload]
/// async fn sleepy(ctx: &mut RunContext) {
///     tokio::time::sleep(Duration::from_millis(5)).await;
///     ctx.incr("calls", 1);
/// }
///
/// let bench = Bench::new(config, sleepy)?;
/// ```
#[proc_macro_attribute]
pub fn workload(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    if func.sig.asyncness.is_none() {
        return Error::new_spanned(&func.sig.fn_token, "#[workload] requires an async fn")
            .to_compile_error()
            .into();
    }
    let ctx = match (func.sig.inputs.len(), func.sig.inputs.first()) {
        (1, Some(FnArg::Typed(arg))) => arg,
        _ => {
            return Error::new_spanned(
                &func.sig.inputs,
                "#[workload] expects exactly one argument: `ctx: &mut RunContext`",
            )
            .to_compile_error()
            .into();
        }
    };

    let attrs = &func.attrs;
    let vis = &func.vis;
    let ident = &func.sig.ident;
    let pat = &ctx.pat;
    let block = &func.block;

    let expanded = quote! {
        #(#attrs)*
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, Default)]
        #vis struct #ident;

        #[::benchrun::async_trait]
        impl ::benchrun::Workload for #ident {
            async fn call(&self, #pat: &mut ::benchrun::RunContext) #block
        }
    };

    TokenStream::from(expanded)
}
