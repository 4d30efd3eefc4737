//! `#[derive(Event)]` — implements `conduit_core::event::{Event, NamedEvent,
//! FromEvent}` for a concrete event struct (spec §3 "Event": "a tagged
//! variant... each event type declares its ancestors").
//!
//! Grounded on the teacher's `BotEvent` derive (`event.rs`'s parent-in-child
//! design, `impl Event`/`FromEvent` generation from struct attributes), cut
//! down to what spec §4.3's hierarchical dispatch actually needs: a static
//! ancestor chain and a raw-JSON re-parse path for ancestor-typed
//! extraction, rather than the teacher's `EventType`/`platform`
//! classification (which models OneBot's `post_type`, not this gateway's
//! event catalog).
//!
//! ```rust,ignore
//! #[derive(Clone, Serialize, Deserialize, Event)]
//! #[event(name = "FriendMessage", chain = "FriendMessage, MessageEvent, Event")]
//! pub struct FriendMessage {
//!     pub sender: Friend,
//!     pub message_chain: MessageChain,
//!     #[event(raw_json)]
//!     #[serde(skip)]
//!     raw: Option<std::sync::Arc<str>>,
//! }
//! ```

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Meta, spanned::Spanned};

struct EventAttrs {
    name: String,
    chain: Vec<String>,
}

fn parse_event_attrs(input: &DeriveInput) -> syn::Result<EventAttrs> {
    let mut name = None;
    let mut chain = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("event") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
            } else if meta.path.is_ident("chain") {
                let value: LitStr = meta.value()?.parse()?;
                chain = Some(value.value().split(',').map(|s| s.trim().to_string()).collect());
            }
            Ok(())
        })?;
    }

    let name = name.ok_or_else(|| syn::Error::new(input.span(), "#[event(name = \"...\")] is required"))?;
    let chain = chain.unwrap_or_else(|| vec![name.clone()]);
    Ok(EventAttrs { name, chain })
}

fn raw_json_field(input: &DeriveInput) -> syn::Result<Option<syn::Ident>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.span(), "#[derive(Event)] only supports structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Ok(None);
    };
    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("event") {
                continue;
            }
            if let Meta::List(list) = &attr.meta {
                let is_raw = list.tokens.to_string().replace(' ', "") == "raw_json";
                if is_raw {
                    return Ok(field.ident.clone());
                }
            }
        }
    }
    Ok(None)
}

pub fn derive_event(input: &DeriveInput) -> syn::Result<TokenStream> {
    let attrs = parse_event_attrs(input)?;
    let raw_field = raw_json_field(input)?;
    let ident = &input.ident;
    let name = &attrs.name;
    let chain = &attrs.chain;

    let raw_json_impl = match &raw_field {
        Some(field) => quote! {
            fn raw_json(&self) -> Option<&str> {
                self.#field.as_deref()
            }
        },
        None => quote! {},
    };

    let from_event_body = if raw_field.is_some() {
        quote! {
            if let Some(exact) = root.as_any().downcast_ref::<#ident>() {
                return Some(exact.clone());
            }
            let raw = root.raw_json()?;
            ::serde_json::from_str(raw).ok()
        }
    } else {
        quote! {
            root.as_any().downcast_ref::<#ident>().cloned()
        }
    };

    Ok(quote! {
        impl ::conduit_core::event::Event for #ident {
            fn event_name(&self) -> &'static str {
                #name
            }

            fn type_chain(&self) -> &'static [&'static str] {
                &[#(#chain),*]
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            #raw_json_impl
        }

        impl ::conduit_core::event::NamedEvent for #ident {
            const NAME: &'static str = #name;
        }

        impl ::conduit_core::event::FromEvent for #ident {
            fn from_event(root: &dyn ::conduit_core::event::Event) -> Option<Self> {
                #from_event_body
            }
        }
    })
}
