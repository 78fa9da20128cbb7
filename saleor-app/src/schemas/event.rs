//! Closed catalog of webhook event types the platform can deliver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! event_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A recognized webhook event type.
        ///
        /// Serializes to and parses from the platform's upper-case event name,
        /// e.g. `ORDER_CREATED`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum EventType {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl EventType {
            /// Every event type in catalog order.
            pub const ALL: &'static [EventType] = &[$(EventType::$variant),+];

            /// The platform's name for this event.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(EventType::$variant => $name,)+
                }
            }
        }

        impl FromStr for EventType {
            type Err = UnknownEventType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(EventType::$variant),)+
                    other => Err(UnknownEventType(other.to_string())),
                }
            }
        }
    };
}

event_types! {
    OrderCreated => "ORDER_CREATED",
    OrderConfirmed => "ORDER_CONFIRMED",
    OrderFullyPaid => "ORDER_FULLY_PAID",
    OrderUpdated => "ORDER_UPDATED",
    OrderCancelled => "ORDER_CANCELLED",
    OrderFulfilled => "ORDER_FULFILLED",
    DraftOrderCreated => "DRAFT_ORDER_CREATED",
    DraftOrderUpdated => "DRAFT_ORDER_UPDATED",
    DraftOrderDeleted => "DRAFT_ORDER_DELETED",
    SaleCreated => "SALE_CREATED",
    SaleUpdated => "SALE_UPDATED",
    SaleDeleted => "SALE_DELETED",
    InvoiceRequested => "INVOICE_REQUESTED",
    InvoiceDeleted => "INVOICE_DELETED",
    InvoiceSent => "INVOICE_SENT",
    CustomerCreated => "CUSTOMER_CREATED",
    CustomerUpdated => "CUSTOMER_UPDATED",
    ProductCreated => "PRODUCT_CREATED",
    ProductUpdated => "PRODUCT_UPDATED",
    ProductDeleted => "PRODUCT_DELETED",
    ProductVariantCreated => "PRODUCT_VARIANT_CREATED",
    ProductVariantUpdated => "PRODUCT_VARIANT_UPDATED",
    ProductVariantDeleted => "PRODUCT_VARIANT_DELETED",
    ProductVariantOutOfStock => "PRODUCT_VARIANT_OUT_OF_STOCK",
    ProductVariantBackInStock => "PRODUCT_VARIANT_BACK_IN_STOCK",
    CheckoutCreated => "CHECKOUT_CREATED",
    CheckoutUpdated => "CHECKOUT_UPDATED",
    FulfillmentCreated => "FULFILLMENT_CREATED",
    FulfillmentCanceled => "FULFILLMENT_CANCELED",
    NotifyUser => "NOTIFY_USER",
    PageCreated => "PAGE_CREATED",
    PageUpdated => "PAGE_UPDATED",
    PageDeleted => "PAGE_DELETED",
    PaymentAuthorize => "PAYMENT_AUTHORIZE",
    PaymentCapture => "PAYMENT_CAPTURE",
    PaymentConfirm => "PAYMENT_CONFIRM",
    PaymentListGateways => "PAYMENT_LIST_GATEWAYS",
    PaymentProcess => "PAYMENT_PROCESS",
    PaymentRefund => "PAYMENT_REFUND",
    PaymentVoid => "PAYMENT_VOID",
    ShippingListMethodsForCheckout => "SHIPPING_LIST_METHODS_FOR_CHECKOUT",
    TranslationCreated => "TRANSLATION_CREATED",
    TranslationUpdated => "TRANSLATION_UPDATED",
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event name outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_size() {
        assert_eq!(EventType::ALL.len(), 43);
    }

    #[test]
    fn test_parse_known_event() {
        assert_eq!(
            "PRODUCT_VARIANT_BACK_IN_STOCK".parse::<EventType>(),
            Ok(EventType::ProductVariantBackInStock)
        );
        assert_eq!(EventType::ShippingListMethodsForCheckout.to_string(), "SHIPPING_LIST_METHODS_FOR_CHECKOUT");
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            "order_created".parse::<EventType>(),
            Err(UnknownEventType("order_created".to_string()))
        );
        assert!("ORDER_EXPLODED".parse::<EventType>().is_err());
    }

    #[test]
    fn test_every_name_parses_back() {
        for event in EventType::ALL {
            assert_eq!(event.as_str().parse::<EventType>().as_ref(), Ok(event));
        }
    }

    #[test]
    fn test_serde_uses_platform_names() {
        let json = serde_json::to_string(&EventType::FulfillmentCanceled).unwrap();
        assert_eq!(json, "\"FULFILLMENT_CANCELED\"");

        let parsed: EventType = serde_json::from_str("\"NOTIFY_USER\"").unwrap();
        assert_eq!(parsed, EventType::NotifyUser);
    }
}
