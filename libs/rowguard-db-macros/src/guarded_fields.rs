use heck::ToUpperCamelCase;
use proc_macro_error2::abort;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, spanned::Spanned};

const DEFAULT_TRAIT_NAME: &str = "GuardedFields";

struct FieldAccess {
    ident: Ident,
    column: Ident,
    setter: Ident,
    ty: syn::Type,
}

#[allow(clippy::needless_pass_by_value)] // DeriveInput is consumed by proc-macro pattern
pub fn expand_derive_guarded_fields(input: DeriveInput) -> TokenStream {
    let Data::Struct(data) = &input.data else {
        abort!(
            input.span(),
            "#[derive(GuardedFields)] can only be applied to structs"
        );
    };
    let Fields::Named(named) = &data.fields else {
        abort!(
            input.span(),
            "#[derive(GuardedFields)] requires a struct with named fields"
        );
    };

    let trait_ident = parse_trait_name(&input);
    let model_ident = &input.ident;

    let fields: Vec<FieldAccess> = named
        .named
        .iter()
        .filter(|field| !is_skipped(field))
        .filter_map(|field| {
            let ident = field.ident.clone()?;
            let bare = ident.unraw().to_string();
            Some(FieldAccess {
                column: Ident::new(&snake_to_upper_camel(&bare), ident.span()),
                setter: format_ident!("set_{}", bare),
                ty: field.ty.clone(),
                ident,
            })
        })
        .collect();

    let signatures = fields.iter().map(|f| {
        let FieldAccess {
            ident, setter, ty, ..
        } = f;
        quote! {
            fn #ident(&self) -> ::core::result::Result<#ty, ::rowguard_db::secure::AuthError>;
            fn #setter(&mut self, value: #ty) -> ::core::result::Result<(), ::rowguard_db::secure::AuthError>;
        }
    });

    let bodies = fields.iter().map(|f| {
        let FieldAccess {
            ident,
            column,
            setter,
            ty,
        } = f;
        quote! {
            fn #ident(&self) -> ::core::result::Result<#ty, ::rowguard_db::secure::AuthError> {
                self.read::<#ty>(Column::#column)
            }

            fn #setter(&mut self, value: #ty) -> ::core::result::Result<(), ::rowguard_db::secure::AuthError> {
                self.set(Column::#column, value)
            }
        }
    });

    let doc = format!("Policy-checked accessors for [`{model_ident}`].");

    quote! {
        #[doc = #doc]
        pub trait #trait_ident {
            #(#signatures)*
        }

        impl<I> #trait_ident for ::rowguard_db::secure::Guarded<#model_ident, I>
        where
            I: ::rowguard_db::secure::Identity,
            Entity: ::rowguard_db::secure::AuthPolicy<I>,
        {
            #(#bodies)*
        }
    }
}

fn parse_trait_name(input: &DeriveInput) -> Ident {
    let mut name: Option<Ident> = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("guarded") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("trait_name") {
                let lit: LitStr = meta.value()?.parse()?;
                if name.is_some() {
                    abort!(lit.span(), "duplicate attribute 'trait_name'");
                }
                name = Some(Ident::new(&lit.value(), lit.span()));
                return Ok(());
            }
            abort!(
                meta.path.span(),
                "unknown guarded attribute on struct; expected `trait_name = \"...\"`"
            );
        });

        if let Err(err) = result {
            abort!(err.span(), "{}", err);
        }
    }

    name.unwrap_or_else(|| Ident::new(DEFAULT_TRAIT_NAME, input.ident.span()))
}

fn is_skipped(field: &syn::Field) -> bool {
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("guarded") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                return Ok(());
            }
            abort!(
                meta.path.span(),
                "unknown guarded attribute on field; expected `skip`"
            );
        });

        if let Err(err) = result {
            abort!(err.span(), "{}", err);
        }
    }

    skip
}

/// Column variant name `DeriveEntityModel` generates for a field.
fn snake_to_upper_camel(field: &str) -> String {
    field.to_upper_camel_case()
}
