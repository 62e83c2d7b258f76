//! REST client for the remote store.
//!
//! Uses `reqwest` 0.13 with a JSON body per request and the session's bearer
//! token. Product lookups used to fill in missing cart images are cached
//! using `moka` (5-minute TTL).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, instrument};
use url::Url;

use basket_sync_core::{CartItem, CartList, LineKey, ProductId, WishlistList};

use super::wire::{
    CartLineBody, CartListResponse, ErrorBody, ProductBody, ProductDetail, ProductsBody,
    WishlistResponse, cart_list,
};
use super::{GatewayError, RemoteStore};
use crate::config::SyncConfig;
use crate::session::LocalSession;

/// Longest error body excerpt carried into logs and errors.
const BODY_EXCERPT: usize = 200;

// =============================================================================
// HttpGateway
// =============================================================================

/// [`RemoteStore`] over the remote store's REST API.
///
/// Cheaply cloneable; clones share the HTTP connection pool and product cache.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    session: LocalSession,
    products: Cache<ProductId, Arc<ProductDetail>>,
}

impl HttpGateway {
    /// Create a gateway for `config.api_url`, authenticated by `session`.
    ///
    /// A 401 from any endpoint signs `session` out.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig, session: LocalSession) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let products = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client,
                base_url: config.api_url.clone(),
                session,
                products,
            }),
        })
    }

    /// Execute one request and decode the JSON response.
    ///
    /// An empty success body decodes as `null`, so mutations can use
    /// [`IgnoredAny`].
    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let token = self.inner.session.token().ok_or(GatewayError::NoSession)?;
        let url = self.inner.base_url.join(path)?;

        let mut request = self
            .inner
            .client
            .request(method.clone(), url)
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, path, "remote store rejected session token");
            if let Err(e) = self.inner.session.logout() {
                tracing::error!(error = %e, "failed to clear persisted session");
            }
            return Err(GatewayError::Unauthorized);
        }

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        let response_text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&response_text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| excerpt(&response_text));
            tracing::warn!(
                %method,
                path,
                status = status.as_u16(),
                message = %message,
                "remote store returned non-success status"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let text = if response_text.trim().is_empty() {
            "null"
        } else {
            response_text.as_str()
        };
        serde_json::from_str(text).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %excerpt(&response_text),
                "failed to parse remote store response"
            );
            GatewayError::Parse(e)
        })
    }

    async fn mutate<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), GatewayError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.send::<IgnoredAny, B>(method, path, body).await?;
        Ok(())
    }

    /// Product detail, used only for image enrichment.
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: &ProductId) -> Result<Arc<ProductDetail>, GatewayError> {
        if let Some(detail) = self.inner.products.get(product_id).await {
            debug!("Cache hit for product");
            return Ok(detail);
        }

        let path = format!("products/{}", product_id.as_str());
        let detail: Arc<ProductDetail> = Arc::new(self.send(Method::GET, &path, None::<&()>).await?);
        self.inner
            .products
            .insert(product_id.clone(), Arc::clone(&detail))
            .await;
        Ok(detail)
    }

    /// Fill in images for lines that arrived without any. Lookup failures
    /// leave the line without images.
    async fn enrich(&self, item: &mut CartItem) {
        if !item.product.images.is_empty() {
            return;
        }
        match self.product(&item.key.product_id).await {
            Ok(detail) => item.product.images = detail.images_for(&item.key.variant_id),
            Err(e) => {
                tracing::warn!(
                    product_id = %item.key.product_id,
                    error = %e,
                    "failed to fetch images for cart line"
                );
            }
        }
    }
}

impl RemoteStore for HttpGateway {
    /// Sums line quantities straight from `cart/list`, without product lookups.
    #[instrument(skip(self))]
    async fn cart_count(&self) -> Result<u32, GatewayError> {
        let response: CartListResponse = self.send(Method::GET, "cart/list", None::<&()>).await?;
        let count = cart_list(response.into_items()).item_count();
        debug!(count, "cart counted");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn list_cart(&self) -> Result<CartList, GatewayError> {
        let response: CartListResponse = self.send(Method::GET, "cart/list", None::<&()>).await?;
        let mut cart = cart_list(response.into_items());
        for item in &mut cart.items {
            self.enrich(item).await;
        }
        debug!(lines = cart.items.len(), count = cart.item_count(), "cart listed");
        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn list_wishlist(&self) -> Result<WishlistList, GatewayError> {
        let response: WishlistResponse =
            self.send(Method::GET, "wishlist/list", None::<&()>).await?;
        let wishlist = response.into_list();
        debug!(count = wishlist.total, "wishlist listed");
        Ok(wishlist)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn add_cart_item(&self, key: &LineKey, quantity: u32) -> Result<(), GatewayError> {
        self.mutate(Method::POST, "cart/add", Some(&CartLineBody { key, quantity }))
            .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn update_cart_item(&self, key: &LineKey, quantity: u32) -> Result<(), GatewayError> {
        self.mutate(Method::POST, "cart/update", Some(&CartLineBody { key, quantity }))
            .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn remove_cart_item(&self, key: &LineKey) -> Result<(), GatewayError> {
        self.mutate(Method::POST, "cart/remove", Some(key)).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), GatewayError> {
        self.mutate(Method::POST, "cart/clear", None::<&()>).await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn add_wishlist_item(&self, key: &LineKey) -> Result<(), GatewayError> {
        let body = ProductBody {
            product_id: key.product_id.as_str(),
        };
        self.mutate(Method::POST, "wishlist/add", Some(&body)).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_wishlist_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        let path = format!("wishlist/remove/{}", product_id.as_str());
        self.mutate(Method::DELETE, &path, None::<&()>).await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn move_wishlist_item_to_cart(&self, key: &LineKey) -> Result<(), GatewayError> {
        let body = ProductBody {
            product_id: key.product_id.as_str(),
        };
        self.mutate(Method::POST, "wishlist/move-to-cart", Some(&body))
            .await
    }

    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    async fn bulk_move_wishlist_to_cart(&self, product_ids: &[ProductId]) -> Result<(), GatewayError> {
        let body = ProductsBody {
            product_ids: product_ids.iter().map(ProductId::as_str).collect(),
        };
        self.mutate(Method::POST, "wishlist/bulk-move-to-cart", Some(&body))
            .await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Http(e)
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT).collect()
}
