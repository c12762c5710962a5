use std::fmt::Debug;

use log::*;

use crate::{
    api::{
        errors::OrderFlowError,
        order_objects::{NewOrderRequest, PaymentConfirmation, SearchResultSubmission},
    },
    db_types::{JobPayload, NewSearchResult, OrderStatusType, ResultStatus, SearchOrder, SearchResult},
    events::{EventProducers, OrderCompletedEvent, OrderProcessingEvent},
    notifications::{search_result_email, search_started_email},
    traits::{CheckoutRequest, CheckoutSession, OrderLifecycleDatabase, PaymentGateway},
};

/// The only provider event type that moves an order forward.
pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";

/// `OrderFlowApi` is the order lifecycle controller. Every change to an order's status goes through it.
///
/// ```text
///   PENDING_PAYMENT --payment confirmed--> PROCESSING --search complete--> COMPLETED_SUCCESS | COMPLETED_FAILURE
/// ```
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderLifecycleDatabase
{
    /// Validates and stores a new order for the user. The order starts out as `PENDING_PAYMENT`.
    pub async fn create_order(&self, user_id: i64, request: NewOrderRequest) -> Result<SearchOrder, OrderFlowError> {
        let order = request.into_new_order(user_id)?;
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order #{} for {} created by user #{user_id}", order.id, order.order_price);
        Ok(order)
    }

    /// Creates a hosted checkout session for the order and records its id on the order.
    ///
    /// If `requester` is given, the order must belong to them. An order belonging to someone else is reported as
    /// not found. The order must be `PENDING_PAYMENT`. If the gateway fails, the order is left unchanged.
    pub async fn begin_checkout<G>(
        &self,
        gateway: &G,
        order_id: i64,
        requester: Option<i64>,
    ) -> Result<CheckoutSession, OrderFlowError>
    where
        G: PaymentGateway + ?Sized,
    {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::NotFound(order_id))?;
        if requester.is_some_and(|user_id| user_id != order.user_id) {
            warn!("🔄️💳️ User #{:?} tried to check out order #{order_id}, which is not theirs", requester);
            return Err(OrderFlowError::NotFound(order_id));
        }
        if order.status != OrderStatusType::PendingPayment {
            debug!("🔄️💳️ Order #{order_id} is {}. Checkout refused", order.status);
            return Err(OrderFlowError::InvalidState { order_id, status: order.status });
        }
        let request = CheckoutRequest {
            order_id,
            price: order.order_price,
            description: format!("Busca de Certidão ({})", order.target_name),
        };
        let session = gateway.create_checkout_session(request).await.map_err(|e| {
            error!("🔄️💳️ Could not create checkout session for order #{order_id}. {e}");
            OrderFlowError::GatewayError(e.to_string())
        })?;
        match self.db.attach_checkout_session(order_id, &session.id).await? {
            Some(_) => {
                info!("🔄️💳️ Checkout session {} created for order #{order_id}", session.id);
                Ok(session)
            },
            None => {
                // The order left PENDING_PAYMENT while the session was being created
                let status = self.current_status(order_id).await?;
                warn!("🔄️💳️ Order #{order_id} became {status} during checkout. Session {} discarded", session.id);
                Err(OrderFlowError::InvalidState { order_id, status })
            },
        }
    }

    /// Handles a payment provider callback.
    ///
    /// The signature is verified before anything else is looked at. Only completed checkout events have any effect.
    /// Redelivered callbacks are harmless: the second and subsequent deliveries report
    /// [`PaymentConfirmation::AlreadyProcessed`] and change nothing.
    pub async fn on_payment_confirmed<G>(
        &self,
        gateway: &G,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentConfirmation, OrderFlowError>
    where
        G: PaymentGateway + ?Sized,
    {
        let event = gateway.verify_webhook(payload, signature).map_err(|e| {
            warn!("🔄️💰️ Payment callback rejected. {e}");
            OrderFlowError::from(e)
        })?;
        if event.event_type != CHECKOUT_COMPLETED_EVENT {
            debug!("🔄️💰️ Ignoring payment provider event '{}'", event.event_type);
            return Ok(PaymentConfirmation::Ignored(event.event_type));
        }
        let reference = event
            .order_reference
            .ok_or_else(|| OrderFlowError::MalformedEvent("The event does not carry an order_id".into()))?;
        let order_id = reference
            .trim()
            .parse::<i64>()
            .map_err(|_| OrderFlowError::MalformedEvent(format!("'{reference}' is not a valid order_id")))?;
        self.confirm_payment(order_id).await
    }

    /// Moves a paid order to `PROCESSING` and, in the same transaction, queues the search and the "search started"
    /// email. Calling this more than once for the same order is safe.
    pub async fn confirm_payment(&self, order_id: i64) -> Result<PaymentConfirmation, OrderFlowError> {
        let started = self
            .db
            .start_processing(order_id, |order, user| {
                vec![JobPayload::RunSearch { order_id: order.id }, JobPayload::SendEmail(search_started_email(user, order))]
            })
            .await?;
        match started {
            Some(order) => {
                info!("🔄️💰️ Payment for order #{order_id} confirmed. Search queued");
                self.call_order_processing_hook(&order).await;
                Ok(PaymentConfirmation::Started(order))
            },
            None => {
                let status = self.current_status(order_id).await?;
                info!("🔄️💰️ Payment confirmation for order #{order_id} ignored. The order is already {status}");
                Ok(PaymentConfirmation::AlreadyProcessed(order_id))
            },
        }
    }

    /// Records the outcome of a finished search. The order must be `PROCESSING`.
    ///
    /// The results are stored, the status changes and the result email is queued in one transaction. The order
    /// completes successfully if any result stored for it is `FOUND`. If the order is not `PROCESSING`, nothing is
    /// stored, so a search that runs twice never leaves a second set of results behind.
    pub async fn on_search_complete(
        &self,
        order_id: i64,
        results: Vec<NewSearchResult>,
    ) -> Result<SearchOrder, OrderFlowError> {
        let count = results.len();
        let found = results.iter().filter(|r| r.status == ResultStatus::Found).count();
        let completed = self
            .db
            .complete_processing(order_id, results, |order, user| {
                vec![JobPayload::SendEmail(search_result_email(user, order))]
            })
            .await?;
        match completed {
            Some(order) => {
                info!(
                    "🔄️🔎️ Search for order #{order_id} complete. {found}/{count} sources found a record. Order is {}",
                    order.status
                );
                self.call_order_completed_hook(&order).await;
                Ok(order)
            },
            None => {
                let status = self.current_status(order_id).await?;
                error!(
                    "🔄️🔎️ Search completion reported for order #{order_id}, but the order is {status}. This should not \
                     happen unless the search ran twice."
                );
                Err(OrderFlowError::InvalidState { order_id, status })
            },
        }
    }

    /// Stores a result reported by a trusted external robot.
    pub async fn submit_result(&self, submission: SearchResultSubmission) -> Result<SearchResult, OrderFlowError> {
        let result = submission.into_new_result()?;
        let order_id = result.order_id;
        if self.db.fetch_order(order_id).await?.is_none() {
            return Err(OrderFlowError::NotFound(order_id));
        }
        let result = self.db.insert_result(result).await?;
        info!("🔄️🔎️ External result from '{}' stored for order #{order_id}", result.source_name);
        Ok(result)
    }

    async fn current_status(&self, order_id: i64) -> Result<OrderStatusType, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::NotFound(order_id))?;
        Ok(order.status)
    }

    async fn call_order_processing_hook(&self, order: &SearchOrder) {
        for emitter in &self.producers.order_processing_producer {
            debug!("🔄️📬️ Notifying order processing hook subscribers");
            emitter.publish_event(OrderProcessingEvent::new(order.clone())).await;
        }
    }

    async fn call_order_completed_hook(&self, order: &SearchOrder) {
        for emitter in &self.producers.order_completed_producer {
            debug!("🔄️📬️ Notifying order completed hook subscribers");
            emitter.publish_event(OrderCompletedEvent::new(order.clone())).await;
        }
    }
}
