use crate::{ApiFailure, Auth, AuthlessClient, Endpoint};
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

pub struct ListZones<'a> {
    pub name: &'a str,
}

impl Endpoint<Vec<Zone>> for ListZones<'_> {
    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String {
        "zones".to_owned()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![("name", self.name.to_owned())]
    }
}

#[async_trait]
pub trait CloudflareZones: Send + Sync {
    async fn list_zones(&self, auth: &Auth, name: &str) -> Result<Vec<Zone>, ApiFailure>;
}

#[async_trait]
impl CloudflareZones for AuthlessClient {
    async fn list_zones(&self, auth: &Auth, name: &str) -> Result<Vec<Zone>, ApiFailure> {
        let endpoint = ListZones { name };
        let res = self.request(&auth.credentials, &endpoint).await?;
        Ok(res.result)
    }
}
