//! Durable `report_id -> IocMatch` map, backed by [`JsonCollection`].

use edr_shared::{IocMatch, Result};

use crate::persistence::JsonCollection;

pub struct IocMatchTable {
    store: JsonCollection<IocMatch>,
}

impl IocMatchTable {
    #[must_use]
    pub const fn new(store: JsonCollection<IocMatch>) -> Self {
        Self { store }
    }

    pub async fn put(&self, ioc_match: IocMatch) {
        self.store.put(ioc_match.report_id.clone(), ioc_match).await;
    }

    pub async fn force_save(&self) -> Result<()> {
        self.store.force_save().await
    }
}
