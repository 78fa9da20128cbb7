//! Handler registry: which callback runs for which event on which transport.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use url::Url;

use super::domain::DomainName;
use super::event::EventType;
use super::webhook::Webhook;

/// Caller-supplied callback for one event type.
///
/// Receives every record of a delivery together with the domain it came from.
pub type WebhookHandler =
    Arc<dyn Fn(Vec<Webhook>, DomainName) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async function or closure as a [`WebhookHandler`].
pub fn handler<F, Fut>(f: F) -> WebhookHandler
where
    F: Fn(Vec<Webhook>, DomainName) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |payload, domain| Box::pin(f(payload, domain)))
}

/// Queue target URL: `amqp` or `amqps` scheme and a `queue` query parameter.
///
/// `amqp://broker:5672/%2f?queue=saleor.orders`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueUrl {
    url: Url,
    queue: String,
}

/// A queue target URL that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid queue URL {url:?}: {reason}")]
pub struct InvalidQueueUrl {
    pub url: String,
    pub reason: &'static str,
}

impl QueueUrl {
    pub fn parse(raw: &str) -> Result<Self, InvalidQueueUrl> {
        let invalid = |reason| InvalidQueueUrl {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|_| invalid("not a URL"))?;

        if !matches!(url.scheme(), "amqp" | "amqps") {
            return Err(invalid("scheme must be amqp or amqps"));
        }
        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(invalid("missing broker host"));
        }

        let queue = url
            .query_pairs()
            .find(|(key, _)| key == "queue")
            .map(|(_, value)| value.into_owned())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| invalid("missing queue parameter"))?;

        Ok(QueueUrl { url, queue })
    }

    /// Name of the queue deliveries are consumed from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Broker the queue lives on.
    pub fn broker(&self) -> Broker {
        Broker::from_url(&self.url)
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for QueueUrl {
    type Err = InvalidQueueUrl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueUrl::parse(s)
    }
}

impl fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Broker identity of an AMQP URL: scheme, host, port and vhost.
///
/// Credentials and query parameters are not part of it. Ports default to
/// 5672 for `amqp` and 5671 for `amqps`, and an empty vhost means `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub vhost: String,
}

impl Broker {
    pub fn from_url(url: &Url) -> Self {
        let port = url
            .port()
            .unwrap_or(if url.scheme() == "amqps" { 5671 } else { 5672 });

        let vhost = url.path().trim_start_matches('/');
        let vhost = if vhost.is_empty() || vhost.eq_ignore_ascii_case("%2f") {
            "/".to_string()
        } else {
            vhost.to_string()
        };

        Broker {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            port,
            vhost,
        }
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{} vhost {}", self.scheme, self.host, self.port, self.vhost)
    }
}

/// How webhooks for a binding reach the app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Posted by the platform to this app's `/webhook` endpoint.
    Http,
    /// Published by the platform to a message queue. Experimental.
    Queue(QueueUrl),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Http => TransportKind::Http,
            Transport::Queue(_) => TransportKind::Queue,
        }
    }
}

/// [`Transport`] without its target, used as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportKind {
    Http,
    Queue,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Queue => "queue",
        }
    }
}

/// A handler bound to an event on one transport.
#[derive(Clone)]
pub struct Binding {
    pub event: EventType,
    pub transport: Transport,
    pub handler: WebhookHandler,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("event", &self.event)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// Event handlers keyed by transport kind and event type.
///
/// Read-only once the app is built. Binding the same event twice on the same
/// transport kind replaces the earlier handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    bindings: HashMap<(TransportKind, EventType), Binding>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler delivered over HTTP.
    pub fn on_http(mut self, event: EventType, handler: WebhookHandler) -> Self {
        self.bind(event, Transport::Http, handler);
        self
    }

    /// Bind a handler delivered through a queue.
    pub fn on_queue(mut self, event: EventType, target_url: QueueUrl, handler: WebhookHandler) -> Self {
        self.bind(event, Transport::Queue(target_url), handler);
        self
    }

    pub fn bind(&mut self, event: EventType, transport: Transport, handler: WebhookHandler) {
        self.bindings.insert(
            (transport.kind(), event),
            Binding {
                event,
                transport,
                handler,
            },
        );
    }

    pub fn get(&self, kind: TransportKind, event: EventType) -> Option<&Binding> {
        self.bindings.get(&(kind, event))
    }

    /// Whether anything is bound on the given transport kind.
    pub fn has(&self, kind: TransportKind) -> bool {
        self.bindings.keys().any(|(k, _)| *k == kind)
    }

    /// Events bound on a transport kind, in catalog order.
    pub fn events(&self, kind: TransportKind) -> Vec<EventType> {
        let mut events: Vec<EventType> = self
            .bindings
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, event)| *event)
            .collect();
        events.sort();
        events
    }

    /// Queue bindings grouped by their target URL.
    pub fn queue_targets(&self) -> BTreeMap<QueueUrl, Vec<EventType>> {
        let mut targets: BTreeMap<QueueUrl, Vec<EventType>> = BTreeMap::new();
        for binding in self.bindings.values() {
            if let Transport::Queue(url) = &binding.transport {
                targets.entry(url.clone()).or_default().push(binding.event);
            }
        }
        for events in targets.values_mut() {
            events.sort();
        }
        targets
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}
