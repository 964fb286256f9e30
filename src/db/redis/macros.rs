/// Read-through lookup against a [`Cache`](crate::db::Cache)
///
/// Evaluates to `Ok(hit)` when `$key` is cached. Otherwise awaits `$compute`,
/// queues its value for a background write expiring after `$ttl` seconds and
/// evaluates to `Ok(value)`. Lookup and compute errors return early from the
/// enclosing function.
///
/// ```ignore
/// let ranked: Vec<CourseId> = cached!(cache, key, ttl, rank_courses())?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $compute:expr) => {{
        let key = &$key;
        match $cache.get_from_cache(key).await? {
            Some(hit) => Ok(hit),
            None => {
                let value = $compute.await?;
                $cache.set_in_background(key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
