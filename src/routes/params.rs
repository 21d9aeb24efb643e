use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::store::orders::Party;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderParty {
    Buyer,
    Seller,
}

/// `type` defaults to `buyer`; any value other than `buyer`/`seller` is rejected.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct OrderListQuery {
    #[serde(rename = "type")]
    pub party: Option<OrderParty>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl OrderListQuery {
    pub fn party(&self) -> Party {
        match self.party {
            Some(OrderParty::Seller) => Party::Seller,
            Some(OrderParty::Buyer) | None => Party::Buyer,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderIdsQuery {
    /// Comma separated, e.g. `1,2,3`.
    pub order_ids: String,
}

impl OrderIdsQuery {
    pub fn parse(&self) -> Option<Vec<i64>> {
        self.order_ids
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<i64>().ok())
            .collect()
    }
}
