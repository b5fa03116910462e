use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derives `ObservedRecord` and `Element` for a struct of named fields.
///
/// Exactly one field must be annotated `#[chronosim(back_address)]` and be
/// of type `chronosim::BackAddress`; every other field gets a pair of
/// generated accessors, `<field>(&self, cap)` and `set_<field>(&mut self,
/// value, cap)`, that notify at `(.., fieldtag)` on every read/write.
#[proc_macro_derive(Observed, attributes(chronosim))]
pub fn derive_observed(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let Data::Struct(data) = input.data else {
        panic!("#[derive(Observed)] only supports structs");
    };
    let Fields::Named(fields) = data.fields else {
        panic!("#[derive(Observed)] requires named fields");
    };

    let mut back_field = None;
    let mut observed_fields = Vec::new();
    for field in fields.named {
        let ident = field.ident.clone().expect("named field");
        if is_back_address_field(&field.attrs) {
            if back_field.is_some() {
                panic!("#[derive(Observed)] found more than one #[chronosim(back_address)] field");
            }
            back_field = Some(ident);
        } else {
            observed_fields.push((ident, field.ty));
        }
    }
    let back_field = back_field
        .unwrap_or_else(|| panic!("#[derive(Observed)] requires a #[chronosim(back_address)] field"));

    let field_tags = observed_fields.iter().map(|(ident, _)| {
        let tag = ident.to_string();
        quote! { chronosim::FieldTag::new(#tag) }
    });

    let accessors = observed_fields.iter().map(|(ident, ty)| {
        let tag = ident.to_string();
        let setter = format_ident!("set_{ident}");
        quote! {
            #[must_use]
            pub fn #ident(&self, cap: &chronosim::CaptureState) -> &#ty {
                if let Some(addr) = chronosim::ObservedRecord::back_address(self).field(chronosim::FieldTag::new(#tag)) {
                    cap.notify(chronosim::CaptureMode::Read, addr);
                }
                &self.#ident
            }

            pub fn #setter(&mut self, value: #ty, cap: &chronosim::CaptureState) {
                if let Some(addr) = chronosim::ObservedRecord::back_address(self).field(chronosim::FieldTag::new(#tag)) {
                    cap.notify(chronosim::CaptureMode::Write, addr);
                }
                self.#ident = value;
            }
        }
    });

    let expanded = quote! {
        impl chronosim::ObservedRecord for #name {
            fn back_address(&self) -> &chronosim::BackAddress {
                &self.#back_field
            }

            fn back_address_mut(&mut self) -> &mut chronosim::BackAddress {
                &mut self.#back_field
            }

            fn field_tags() -> &'static [chronosim::FieldTag] {
                static TAGS: std::sync::OnceLock<Vec<chronosim::FieldTag>> = std::sync::OnceLock::new();
                TAGS.get_or_init(|| vec![#(#field_tags),*])
            }
        }

        impl chronosim::Element for #name {
            const NOTIFIES_AT_INDEX: bool = false;

            fn reseat(&mut self, addr: chronosim::Address) {
                *chronosim::ObservedRecord::back_address_mut(self) = chronosim::BackAddress::Attached(addr);
            }

            fn detach(&mut self, cap: &chronosim::CaptureState) {
                chronosim::ObservedRecord::notify_all(self, cap);
                *chronosim::ObservedRecord::back_address_mut(self) = chronosim::BackAddress::Detached;
            }

            fn is_attached(&self) -> bool {
                chronosim::ObservedRecord::back_address(self).is_attached()
            }
        }

        impl #name {
            #(#accessors)*
        }
    };
    expanded.into()
}

fn is_back_address_field(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("chronosim")
            && attr
                .parse_args::<syn::Ident>()
                .is_ok_and(|ident| ident == "back_address")
    })
}
