//! ABOUTME: The atomic increment-and-get script run server-side for every quota check

/// `KEYS[1]` = daily counter key, `KEYS[2]` = monthly counter key,
/// `KEYS[3]` = last-request timestamp key.
/// `ARGV[1]` = daily TTL seconds, `ARGV[2]` = monthly TTL seconds,
/// `ARGV[3]` = current unix timestamp.
///
/// Returns `{daily_used, monthly_used, daily_ttl_remaining, monthly_ttl_remaining}`.
/// TTL is only (re)armed the first time a key is created in its period
/// (`INCR` returning 1) so a key that already exists keeps counting down to
/// its original period boundary rather than resetting on every call.
pub const INCREMENT_AND_GET: &str = r"
local daily = redis.call('INCR', KEYS[1])
if daily == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end

local monthly = redis.call('INCR', KEYS[2])
if monthly == 1 then
    redis.call('EXPIRE', KEYS[2], ARGV[2])
end

redis.call('SET', KEYS[3], ARGV[3])

local daily_ttl = redis.call('TTL', KEYS[1])
local monthly_ttl = redis.call('TTL', KEYS[2])

return {daily, monthly, daily_ttl, monthly_ttl}
";
