//! `GraphQlVariables` derive macro implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Fields, Type, parse2};

use crate::rename::RenameRule;

/// Struct-level options parsed from `#[graphql(...)]` attributes.
#[derive(Debug, Clone, Default)]
struct StructOptions {
    rename_all: Option<RenameRule>,
}

/// Field options parsed from `#[graphql(...)]` attributes.
#[derive(Debug, Clone, Default)]
struct FieldOptions {
    graphql_type: Option<syn::LitStr>,
    rename: Option<String>,
    skip: bool,
}

/// Expand the `#[derive(GraphQlVariables)]` macro.
pub fn expand_graphql_variables(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = parse2(input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let struct_options = parse_struct_options(&input.attrs)?;

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "GraphQlVariables derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "GraphQlVariables derive only supports structs",
            ));
        }
    };

    let mut field_handlers = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let options = parse_field_options(&field.attrs)?;
        if options.skip {
            continue;
        }
        let Some(graphql_type) = options.graphql_type else {
            return Err(syn::Error::new_spanned(
                field_name,
                "missing GraphQL type, add #[graphql(type = \"...\")]",
            ));
        };
        if graphql_type.value().trim().is_empty() {
            return Err(syn::Error::new_spanned(
                &graphql_type,
                "GraphQL type must not be empty",
            ));
        }

        // Explicit rename > rename_all > field name
        let field_string = field_name.to_string();
        let field_string = field_string.trim_start_matches("r#");
        let key = if let Some(rename) = options.rename {
            rename
        } else if let Some(rule) = struct_options.rename_all {
            rule.apply(field_string)
        } else {
            field_string.to_string()
        };

        field_handlers.push(generate_field_handler(field_name, &field.ty, &key, &graphql_type));
    }

    Ok(quote! {
        impl #impl_generics ::tanuki::graphql::GraphQlVariables for #name #ty_generics #where_clause {
            fn graphql_variables(
                &self,
            ) -> ::tanuki::Result<::std::vec::Vec<::tanuki::graphql::Variable>> {
                let mut variables = ::std::vec::Vec::new();
                #(#field_handlers)*
                ::std::result::Result::Ok(variables)
            }
        }
    })
}

fn parse_struct_options(attrs: &[syn::Attribute]) -> syn::Result<StructOptions> {
    let mut options = StructOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("graphql") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let value: syn::LitStr = meta.value()?.parse()?;
                let rule = RenameRule::parse(&value.value()).ok_or_else(|| {
                    syn::Error::new_spanned(
                        &value,
                        format!(
                            "unknown rename_all value: \"{}\". Expected one of: {}",
                            value.value(),
                            RenameRule::EXPECTED
                        ),
                    )
                })?;
                options.rename_all = Some(rule);
                Ok(())
            } else {
                Err(meta.error("unknown struct attribute, expected `rename_all`"))
            }
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("graphql") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type") {
                options.graphql_type = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error("unknown field attribute, expected `type`, `rename` or `skip`"));
            }
            Ok(())
        })?;
    }

    Ok(options)
}

/// `None` options are left out entirely rather than sent as `null`.
fn generate_field_handler(
    field_name: &syn::Ident,
    field_ty: &Type,
    key: &str,
    graphql_type: &syn::LitStr,
) -> TokenStream {
    if is_option_type(field_ty) {
        quote! {
            if let ::std::option::Option::Some(value) = &self.#field_name {
                variables.push(::tanuki::graphql::Variable::try_new(#key, #graphql_type, value)?);
            }
        }
    } else {
        quote! {
            variables.push(::tanuki::graphql::Variable::try_new(#key, #graphql_type, &self.#field_name)?);
        }
    }
}

/// Check if a type is `Option<T>`.
fn is_option_type(ty: &Type) -> bool {
    matches!(ty, Type::Path(type_path)
        if type_path.path.segments.last()
            .is_some_and(|seg| seg.ident == "Option"))
}
