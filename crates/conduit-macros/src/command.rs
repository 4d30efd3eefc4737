//! `#[derive(Command)]` — implements `conduit_core::command::Command` for a
//! struct, generating `CommandInfo` from the struct's field declaration
//! order (spec §3 "ordered list of field names for positional-argument
//! binding", Design Note 1: replaces the dynamic `bot.sendFriendMessage(…)`
//! attribute dispatch `ApiMetaclass` builds at runtime).
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize, Command)]
//! #[command(name = "sendFriendMessage", alias = "send_friend_message", response = "SendMessageResponse")]
//! pub struct SendFriendMessage {
//!     pub target: i64,
//!     pub message_chain: MessageChain,
//! }
//! ```

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, spanned::Spanned};

struct CommandAttrs {
    name: String,
    alias: String,
    response: Ident,
}

fn parse_attrs(input: &DeriveInput) -> syn::Result<CommandAttrs> {
    let mut name = None;
    let mut alias = None;
    let mut response = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("command") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("alias") {
                alias = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("response") {
                let lit: LitStr = meta.value()?.parse()?;
                response = Some(Ident::new(&lit.value(), lit.span()));
            }
            Ok(())
        })?;
    }

    let name = name.ok_or_else(|| syn::Error::new(input.span(), "#[command(name = \"...\")] is required"))?;
    let alias = alias.unwrap_or_else(|| to_snake_case(&name));
    let response = response.ok_or_else(|| {
        syn::Error::new(input.span(), "#[command(response = \"...\")] is required")
    })?;

    Ok(CommandAttrs { name, alias, response })
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn derive_command(input: &DeriveInput) -> syn::Result<TokenStream> {
    let attrs = parse_attrs(input)?;
    let ident = &input.ident;
    let name = &attrs.name;
    let alias = &attrs.alias;
    let response = &attrs.response;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.span(), "#[derive(Command)] only supports structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(input.span(), "#[derive(Command)] requires named fields"));
    };

    let field_names: Vec<String> = fields
        .named
        .iter()
        .filter(|f| !has_skip(f))
        .map(|f| f.ident.as_ref().unwrap().to_string())
        .collect();

    Ok(quote! {
        impl ::conduit_core::command::Command for #ident {
            type Response = #response;

            fn info() -> ::conduit_core::command::CommandInfo {
                ::conduit_core::command::CommandInfo {
                    name: #name,
                    alias: #alias,
                    parameter_names: &[#(#field_names),*],
                }
            }
        }
    })
}

fn has_skip(field: &syn::Field) -> bool {
    field.attrs.iter().any(|attr| {
        attr.path().is_ident("command")
            && attr
                .parse_nested_meta(|meta| if meta.path.is_ident("skip") { Ok(()) } else { Err(meta.error("unknown")) })
                .is_ok()
    })
}
