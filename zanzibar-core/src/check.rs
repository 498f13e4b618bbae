use crate::{
    error::{Result, ZanzibarError},
    models::*,
    namespace::NamespaceRegistry,
    repository::TupleStore,
    schema::{NamespaceDefinition, RewriteRule},
};
use ahash::{AHashMap, AHashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Recursion bound applied regardless of how the namespace is shaped
pub const DEFAULT_MAX_DEPTH: u32 = 25;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type CheckKey = (Identifier, String, Identifier);

/// Request-scoped evaluation state; never shared between checks.
///
/// Every evaluated key is memoized, so a top-level check visits each
/// `(object, relation, user)` at most once however cyclic the namespace is.
struct CheckContext {
    memo: AHashMap<CheckKey, bool>,
    /// Denials whose subtree hit a cut; only valid for the current root
    tainted: AHashSet<CheckKey>,
    stack: AHashSet<CheckKey>,
    anomalies: Vec<Anomaly>,
    /// Bumped by every cut and every reuse of a tainted denial
    taint: u64,
    trace: Option<Vec<String>>,
    deadline: Instant,
    timeout: Duration,
}

impl CheckContext {
    fn new(timeout: Duration, debug_trace: bool) -> Self {
        Self {
            memo: AHashMap::new(),
            tainted: AHashSet::new(),
            stack: AHashSet::new(),
            anomalies: Vec::new(),
            taint: 0,
            trace: debug_trace.then(Vec::new),
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Record a cycle/depth cut. Anomalies are de-duplicated so the list
    /// stays bounded by the number of relations.
    fn cut(&mut self, anomaly: Anomaly) {
        self.taint = self.taint.saturating_add(1);
        if !self.anomalies.contains(&anomaly) {
            self.anomalies.push(anomaly);
        }
    }

    /// Forget cut-dependent denials before evaluating another root relation
    /// with the same context.
    fn start_root(&mut self) {
        for key in self.tainted.drain() {
            self.memo.remove(&key);
        }
    }

    fn record(&mut self, line: impl FnOnce() -> String) {
        if let Some(ref mut trace) = self.trace {
            trace.push(line());
        }
    }

    fn deadline_error(&self) -> ZanzibarError {
        ZanzibarError::DeadlineExceeded {
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Permission checker evaluates rewrite rules against stored tuples:
/// - Direct tuples
/// - Unions, short-circuiting in declaration order
/// - Computed usersets on the same object
///
/// Cycles and the depth bound cut the offending path to `false` and are
/// reported as anomalies; they never produce an error or a grant.
pub struct PermissionChecker {
    store: Arc<dyn TupleStore>,
    registry: Arc<NamespaceRegistry>,
    max_depth: u32,
    debug_trace: bool,
}

impl PermissionChecker {
    pub fn new(store: Arc<dyn TupleStore>, registry: Arc<NamespaceRegistry>) -> Self {
        Self {
            store,
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            debug_trace: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_trace = enabled;
        self
    }

    /// Check whether `request.user` holds `request.relation` on `request.object`
    ///
    /// # Errors
    /// `NamespaceNotFound`/`RelationNotFound` for configuration gaps,
    /// `DeadlineExceeded` when evaluation outlives `timeout`.
    pub async fn check(&self, request: &CheckRequest, timeout: Duration) -> Result<CheckResult> {
        // One snapshot for the whole evaluation: a concurrent define cannot
        // change the rules halfway through.
        let namespace = self.registry.get(request.object.kind())?;
        namespace.rule(&request.relation)?;

        let mut ctx = CheckContext::new(timeout, self.debug_trace);
        let evaluation = self.evaluate(
            &namespace,
            &request.object,
            &request.relation,
            &request.user,
            &mut ctx,
            0,
        );
        let outcome = tokio::time::timeout(timeout, evaluation).await;
        let authorized = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(ctx.deadline_error()),
        };

        if !ctx.anomalies.is_empty() {
            warn!(
                check = %request,
                anomalies = ?ctx.anomalies,
                "Check hit cycle/depth safety net; affected paths denied"
            );
        }
        debug!(check = %request, authorized, "Check completed");

        Ok(CheckResult {
            authorized,
            anomalies: ctx.anomalies,
            trace: ctx.trace,
        })
    }

    /// Every relation of the object's namespace the user holds, sorted.
    /// Shares one memo table across the relations; cut-dependent denials
    /// are dropped between relations.
    pub async fn accessible_relations(
        &self,
        object: &Identifier,
        user: &Identifier,
        timeout: Duration,
    ) -> Result<Vec<String>> {
        let namespace = self.registry.get(object.kind())?;
        let mut ctx = CheckContext::new(timeout, false);

        let evaluation = async {
            let mut granted = Vec::new();
            for relation in namespace.relation_names() {
                ctx.start_root();
                if self.evaluate(&namespace, object, relation, user, &mut ctx, 0).await? {
                    granted.push(relation.to_string());
                }
            }
            Ok::<_, ZanzibarError>(granted)
        };
        let outcome = tokio::time::timeout(timeout, evaluation).await;
        let granted = match outcome {
            Ok(granted) => granted?,
            Err(_) => return Err(ctx.deadline_error()),
        };

        if !ctx.anomalies.is_empty() {
            warn!(
                %object,
                %user,
                anomalies = ?ctx.anomalies,
                "Relation listing hit cycle/depth safety net; affected paths denied"
            );
        }
        Ok(granted)
    }

    fn evaluate<'a>(
        &'a self,
        namespace: &'a NamespaceDefinition,
        object: &'a Identifier,
        relation: &'a str,
        user: &'a Identifier,
        ctx: &'a mut CheckContext,
        depth: u32,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            if Instant::now() >= ctx.deadline {
                return Err(ctx.deadline_error());
            }

            let key: CheckKey = (object.clone(), relation.to_string(), user.clone());
            if let Some(&cached) = ctx.memo.get(&key) {
                if ctx.tainted.contains(&key) {
                    ctx.taint = ctx.taint.saturating_add(1);
                }
                return Ok(cached);
            }

            if depth > self.max_depth {
                ctx.cut(Anomaly::DepthExceeded {
                    relation: relation.to_string(),
                    max_depth: self.max_depth,
                });
                ctx.record(|| format!("{object}#{relation}@{user}: depth bound, denied"));
                return Ok(false);
            }
            if ctx.stack.contains(&key) {
                ctx.cut(Anomaly::Cycle {
                    object: object.to_string(),
                    relation: relation.to_string(),
                });
                ctx.record(|| format!("{object}#{relation}@{user}: cycle, denied"));
                return Ok(false);
            }

            let rule = namespace.rule(relation)?;
            debug!(%object, relation, %user, depth, "Evaluating relation");

            let taint_before = ctx.taint;
            ctx.stack.insert(key.clone());
            let result = self
                .evaluate_rule(namespace, rule, object, relation, user, ctx, depth)
                .await;
            ctx.stack.remove(&key);
            let authorized = result?;

            if !authorized && ctx.taint != taint_before {
                ctx.tainted.insert(key.clone());
            }
            ctx.memo.insert(key, authorized);
            ctx.record(|| format!("{object}#{relation}@{user} = {authorized}"));
            Ok(authorized)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_rule<'a>(
        &'a self,
        namespace: &'a NamespaceDefinition,
        rule: &'a RewriteRule,
        object: &'a Identifier,
        relation: &'a str,
        user: &'a Identifier,
        ctx: &'a mut CheckContext,
        depth: u32,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            match rule {
                RewriteRule::Direct => {
                    let found = self.store.exists(object, relation, user).await?;
                    ctx.record(|| format!("direct {object}#{relation}@{user}: {found}"));
                    Ok(found)
                }
                RewriteRule::Union(children) => {
                    for child in children {
                        if self
                            .evaluate_rule(namespace, child, object, relation, user, ctx, depth)
                            .await?
                        {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                RewriteRule::ComputedUserset { relation: target } => {
                    self.evaluate(
                        namespace,
                        object,
                        target,
                        user,
                        ctx,
                        depth.saturating_add(1),
                    )
                    .await
                }
            }
        })
    }
}
