use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::info;

use meshsync_shared::BaseId;

use crate::error::ProxyError;
use crate::externalized::ExternalizedProxy;
use crate::proxy::Proxy;

/// All of one mesh base's proxies, keyed by partner. Guarantees at most
/// one proxy per partner: the map lock is held through the factory call,
/// so two threads asking for the same new partner cannot both create one.
pub struct ProxyDirectory {
    local_id: BaseId,
    proxies: Mutex<HashMap<BaseId, Arc<Proxy>>>,
}

impl ProxyDirectory {
    pub fn new(local_id: BaseId) -> Self {
        Self {
            local_id,
            proxies: Mutex::new(HashMap::new()),
        }
    }

    pub fn local_id(&self) -> &BaseId {
        &self.local_id
    }

    /// Returns the proxy for `partner`, creating it through `create` if
    /// none exists yet. The factory runs at most once per partner.
    pub fn obtain_for<F>(&self, partner: &BaseId, create: F) -> Result<Arc<Proxy>, ProxyError>
    where
        F: FnOnce() -> Result<Proxy, ProxyError>,
    {
        let mut proxies = self.proxies.lock().map_err(|_| ProxyError::Poisoned)?;
        if let Some(existing) = proxies.get(partner) {
            return Ok(existing.clone());
        }
        info!("Directory {}: creating proxy for {}", self.local_id, partner);
        let created = Arc::new(create()?);
        proxies.insert(partner.clone(), created.clone());
        Ok(created)
    }

    /// Returns the proxy for `partner` if one exists, without creating
    pub fn get(&self, partner: &BaseId) -> Option<Arc<Proxy>> {
        self.proxies.lock().ok()?.get(partner).cloned()
    }

    /// Forgets the proxy for `partner`, e.g. after it reported a cease
    pub fn remove(&self, partner: &BaseId) -> Option<Arc<Proxy>> {
        self.proxies.lock().ok()?.remove(partner)
    }

    pub fn partners(&self) -> Vec<BaseId> {
        match self.proxies.lock() {
            Ok(proxies) => proxies.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.proxies.lock().map(|proxies| proxies.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends every relationship and empties the directory. Permanent
    /// shutdown queues cease messages; the caller still drives one final
    /// send pass to get them out.
    pub fn shutdown(&self, permanent: bool) -> Result<Vec<Arc<Proxy>>, ProxyError> {
        let mut proxies = self.proxies.lock().map_err(|_| ProxyError::Poisoned)?;
        let drained: Vec<Arc<Proxy>> = proxies.drain().map(|(_, proxy)| proxy).collect();
        for proxy in &drained {
            proxy.die(permanent)?;
        }
        Ok(drained)
    }

    /// Externalizes every live proxy, for persistence across a restart
    pub fn externalize_all(&self) -> Result<Vec<ExternalizedProxy>, ProxyError> {
        let proxies = self.proxies.lock().map_err(|_| ProxyError::Poisoned)?;
        proxies.values().map(|proxy| proxy.externalize()).collect()
    }
}
