//! LDAP crawl client
//!
//! One [`LdapCrawler`] owns one directory connection. It runs paged
//! subtree searches, keeps the connection healthy across crawl cycles by
//! probing the root DSE and reconnecting once on communication faults,
//! and tracks attribute coverage so operators can see when the directory
//! stops serving attributes the deployment asked for.
//!
//! The caller must not share a crawler across concurrent operations; the
//! `&mut self` methods make each connection exclusively occupied.

use std::collections::BTreeSet;

use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, instrument, warn};

use dirindex_core::error::{CrawlError, CrawlResult};
use dirindex_core::status::{Status, StatusCode};
use dirindex_core::traits::{SensitiveValueDecoder, StatusSource};

use crate::config::LdapServerConfig;
use crate::entry::DirectoryEntity;

/// Page size for paged result searches.
const PAGE_SIZE: i32 = 1000;

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Crawler for one configured directory connection.
pub struct LdapCrawler {
    config: LdapServerConfig,
    bind_password: String,
    ldap: Option<Ldap>,
    validation: ValidationState,
}

impl LdapCrawler {
    /// Create a crawler from a validated configuration. Does not connect.
    pub fn new(
        config: LdapServerConfig,
        decoder: &dyn SensitiveValueDecoder,
    ) -> CrawlResult<Self> {
        config.validate()?;
        let bind_password = decoder.decode(&config.bind_password)?;
        Ok(Self {
            config,
            bind_password,
            ldap: None,
            validation: ValidationState::default(),
        })
    }

    /// Host name of the underlying server.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.config.host
    }

    /// The display template in effect for this connection.
    #[must_use]
    pub fn display_template(&self) -> String {
        self.config.effective_display_template()
    }

    /// Connect and bind, verifying the credentials work.
    #[instrument(skip(self), fields(url = %self.config.url()))]
    pub async fn initialize(&mut self) -> CrawlResult<()> {
        debug!(config = ?self.config.redacted(), "initializing directory connection");
        self.ldap = Some(self.create_connection().await?);
        info!("directory connection established");
        Ok(())
    }

    async fn create_connection(&self) -> CrawlResult<Ldap> {
        let url = self.config.url();
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.read_timeout()?);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| classify_fault(&format!("connect to {url}"), e))?;

        // Drive the connection until it closes.
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "connection driver error");
            }
        });

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.bind_password)
            .await
            .map_err(|e| classify_fault(&format!("bind to {url}"), e))?;
        match result.rc {
            0 => {
                debug!(bind_dn = %self.config.bind_dn, "bind succeeded");
                Ok(ldap)
            }
            RC_INVALID_CREDENTIALS => Err(CrawlError::AuthenticationFailed),
            rc => Err(CrawlError::connection_failed(format!(
                "bind to {url} failed: rc={rc} {}",
                result.text
            ))),
        }
    }

    /// Make sure the cached connection still works before a crawl
    /// operation. A failed root DSE probe triggers one reconnect; a
    /// second failure or an authentication failure propagates.
    pub async fn ensure_connection_is_current(&mut self) -> CrawlResult<()> {
        if self.ldap.is_none() {
            self.ldap = Some(self.create_connection().await?);
        }
        match self.probe().await {
            Ok(()) => Ok(()),
            Err(err) if err.is_transient() => {
                warn!(host = %self.config.host, error = %err, "stale connection, reconnecting");
                self.ldap = Some(self.create_connection().await?);
                self.probe().await.map_err(|err| {
                    note_timeout_advice(&err);
                    err
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn probe(&mut self) -> CrawlResult<()> {
        let timeout = self.config.read_timeout()?;
        let ldap = self
            .ldap
            .as_mut()
            .ok_or_else(|| CrawlError::connection_failed("not connected"))?;
        ldap.with_timeout(timeout)
            .search("", Scope::Base, "(objectClass=*)", vec!["dn"])
            .await
            .map_err(|e| classify_fault("root DSE probe", e))?
            .success()
            .map_err(|e| classify_fault("root DSE probe", e))?;
        Ok(())
    }

    /// Run a full scan of the configured subtree and return every entity
    /// found, recording attribute coverage for status reporting.
    /// Completes validation even when the subtree is empty.
    #[instrument(skip(self), fields(host = %self.config.host, base = %self.config.base_dn))]
    pub async fn scan_all(&mut self) -> CrawlResult<Vec<DirectoryEntity>> {
        let attrs = self.config.attribute_list();
        let base = self.config.base_dn.clone();
        let filter = self.config.user_filter.clone();
        let entities = self.search(&base, &filter, &attrs).await?;

        let mut coverage = AttributeCoverage::new(&attrs);
        for entity in &entities {
            coverage.observe(entity);
        }
        self.validation = ValidationState {
            full_scan_completed: true,
            missing_attributes: coverage.missing(),
            template_only_attributes: coverage
                .template_only(&self.config.effective_display_template()),
        };

        info!(entities = entities.len(), "full scan complete");
        Ok(entities)
    }

    /// Fetch the single entity at a DN, searching the subtree rooted
    /// there with the configured filter. Returns None when the entry is
    /// gone and an error when the DN unexpectedly matches several
    /// entries.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn fetch_one(&mut self, dn: &str) -> CrawlResult<Option<DirectoryEntity>> {
        let filter = self.config.user_filter.clone();
        let attrs = self.config.attribute_list();
        let entities = self.search(dn, &filter, &attrs).await?;
        single_result(dn, entities)
    }

    /// Run a paged subtree search, skipping individual malformed records.
    ///
    /// When the server refuses the paged results control the search is
    /// retried unpaged. A communication fault mid-stream is logged and
    /// the entities collected so far are returned.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[String],
    ) -> CrawlResult<Vec<DirectoryEntity>> {
        self.ensure_connection_is_current().await?;
        let timeout = self.config.read_timeout()?;
        let attr_refs: Vec<&str> = attrs.iter().map(String::as_str).collect();
        let ldap = self
            .ldap
            .as_mut()
            .ok_or_else(|| CrawlError::connection_failed("not connected"))?;

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];
        let mut stream = match ldap
            .with_timeout(timeout)
            .streaming_search_with(adapters, base, Scope::Subtree, filter, attr_refs.clone())
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "paged search unavailable, retrying without paging");
                let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![Box::new(EntriesOnly::new())];
                ldap.with_timeout(timeout)
                    .streaming_search_with(adapters, base, Scope::Subtree, filter, attr_refs)
                    .await
                    .map_err(|e| fault_with_advice(&format!("search under {base}"), e))?
            }
        };

        let mut entities = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(entry)) => {
                    let entry = SearchEntry::construct(entry);
                    match DirectoryEntity::from_search_entry(entry) {
                        Ok(entity) => entities.push(entity),
                        Err(err) => {
                            warn!(error = %err, "skipping malformed search result");
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let err = fault_with_advice(&format!("search under {base}"), err);
                    warn!(
                        error = %err,
                        collected = entities.len(),
                        "search ended early, returning partial results"
                    );
                    return Ok(entities);
                }
            }
        }
        if let Err(err) = stream.finish().await.success() {
            warn!(error = %err, "search did not terminate cleanly");
        }
        debug!(entities = entities.len(), "search complete");
        Ok(entities)
    }
}

impl StatusSource for LdapCrawler {
    fn name(&self) -> String {
        self.config.nickname().to_string()
    }

    fn retrieve_status(&self) -> Status {
        self.validation.status(self.config.nickname())
    }
}

/// Reduce a DN-rooted search to its single expected entity. More than
/// one match means the deployment's filter is not selective at that DN,
/// which must surface rather than be resolved by picking one.
fn single_result(
    dn: &str,
    mut entities: Vec<DirectoryEntity>,
) -> CrawlResult<Option<DirectoryEntity>> {
    if entities.len() > 1 {
        return Err(CrawlError::AmbiguousResult {
            dn: dn.to_string(),
            count: entities.len(),
        });
    }
    Ok(entities.pop())
}

/// Classify a protocol-level fault. Faults whose description mentions a
/// timeout become [`CrawlError::ReadTimeout`]; everything else is a
/// connection failure.
fn classify_fault(context: &str, err: ldap3::LdapError) -> CrawlError {
    if is_timeout_text(&err.to_string()) {
        CrawlError::read_timeout(format!("{context}: {err}"))
    } else {
        CrawlError::connection_failed_with_source(format!("{context}: {err}"), err)
    }
}

/// The protocol library reports timeouts only through the fault
/// description, so classification inspects the text.
fn is_timeout_text(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("timed out") || text.contains("timeout")
}

fn fault_with_advice(context: &str, err: ldap3::LdapError) -> CrawlError {
    let err = classify_fault(context, err);
    note_timeout_advice(&err);
    err
}

/// Operator hint emitted whenever a read times out.
fn note_timeout_advice(err: &CrawlError) {
    if matches!(err, CrawlError::ReadTimeout { .. }) {
        warn!("read timed out; consider increasing read_timeout_secs");
    }
}

/// Bookkeeping for which requested attributes a scan actually observed.
///
/// Attribute names are compared case-insensitively. The pseudo-attribute
/// `dn` counts as fetched only when the configured list requests it, and
/// is never expected to appear on an entry.
#[derive(Debug)]
struct AttributeCoverage {
    not_yet_seen: BTreeSet<String>,
    fetched: BTreeSet<String>,
}

impl AttributeCoverage {
    fn new<S: AsRef<str>>(requested: &[S]) -> Self {
        let mut fetched = BTreeSet::new();
        let mut not_yet_seen = BTreeSet::new();
        for attr in requested {
            let folded = attr.as_ref().to_lowercase();
            if !folded.is_empty() && folded != "dn" {
                not_yet_seen.insert(folded.clone());
            }
            fetched.insert(folded);
        }
        Self {
            not_yet_seen,
            fetched,
        }
    }

    fn observe(&mut self, entity: &DirectoryEntity) {
        if self.not_yet_seen.is_empty() {
            return;
        }
        for name in entity.attribute_names() {
            self.not_yet_seen.remove(&name.to_lowercase());
        }
    }

    /// Requested attributes never observed, sorted, or None when every
    /// attribute was seen at least once.
    fn missing(&self) -> Option<String> {
        if self.not_yet_seen.is_empty() {
            None
        } else {
            Some(
                self.not_yet_seen
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        }
    }

    /// Template placeholders naming attributes that are not fetched, in
    /// template order with repeats kept, or None when the template only
    /// references fetched attributes.
    fn template_only(&self, template: &str) -> Option<String> {
        let mut unfetched = Vec::new();
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '{' {
                continue;
            }
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if !self.fetched.contains(&name.to_lowercase()) {
                unfetched.push(name);
            }
        }
        if unfetched.is_empty() {
            None
        } else {
            Some(unfetched.join(", "))
        }
    }
}

/// Validation outcome of the most recent full scan.
#[derive(Debug, Clone, Default)]
struct ValidationState {
    full_scan_completed: bool,
    missing_attributes: Option<String>,
    template_only_attributes: Option<String>,
}

impl ValidationState {
    /// Rank this connection's validation outcome. A template referencing
    /// unfetched attributes outranks attributes that were merely never
    /// seen, and an incomplete scan outranks both.
    fn status(&self, nickname: &str) -> Status {
        if !self.full_scan_completed {
            return Status::new(
                StatusCode::Unavailable,
                format!("validation of {nickname} still in progress"),
            );
        }
        if let Some(attrs) = &self.template_only_attributes {
            return Status::new(
                StatusCode::Error,
                format!("{nickname}: display template references unfetched attribute(s): {attrs}"),
            );
        }
        if let Some(attrs) = &self.missing_attributes {
            return Status::new(
                StatusCode::Warning,
                format!("{nickname}: attribute(s) never seen during last scan: {attrs}"),
            );
        }
        Status::new(StatusCode::Normal, "")
    }
}
