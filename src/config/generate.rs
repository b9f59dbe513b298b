pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGDRAIN CONFIGURATION
# =============================================================================
# logdrain receives framed syslog lines over HTTP (POST /<log-group>) and
# forwards them in batches to an append-only log store, one stream per
# log group per process.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logdrain/config.yml
#   3. /etc/logdrain/config.yml
#
# Any value may reference an environment variable as $env{NAME}.
# Command-line flags (--bind, --retention, --user, --pass, --strip-ansi-codes)
# override the values below.

# =============================================================================
# SERVER
# =============================================================================

server:
  # Address the HTTP drain listens on. ":8080" listens on every interface.
  bind: 0.0.0.0:8080

  # Basic-auth credentials required on every POST. Leave both empty to accept
  # unauthenticated requests.
  username: ""
  password: ""

  # Remove terminal colour sequences from messages before delivery
  strip_ansi_codes: false

  # How each message is rendered:
  #   text: "<app>[<process>]: <payload>"
  #   json: {"heroku_app": ..., "heroku_process": ..., ...payload fields}
  message_format: text

  # How long in-flight requests get to finish once shutdown starts
  shutdown_grace: 5s

# =============================================================================
# SINK
# =============================================================================
# One sink per log group. Entries are buffered and flushed when the batch is
# full or flush_interval after the first entry arrived, whichever comes first.

sink:
  # Retention applied to log groups created by this process.
  # 0 leaves retention unset. Supported values: 1, 3, 5, 7, 14, 30, 60, 90,
  # 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922, 3288, 3653
  retention_days: 0

  flush_interval: 1s

  # Batch limits. The store rejects appends over 1048576 bytes or 10000 events.
  max_batch_bytes: 1047552
  max_batch_events: 10000

  # Bytes the store counts per event on top of the message itself
  event_overhead: 26

  # Longer messages are truncated
  max_event_bytes: 262118

  # Per-sink inbound queue. Requests wait when it is full.
  queue_capacity: 1024

  # How long shutdown waits for sinks to deliver what they hold.
  # Use 'infinite' to wait until everything is delivered.
  drain_timeout: 30s

# =============================================================================
# STORE
# =============================================================================
# Where batches are delivered.
#
#   type: memory       keep the newest events of each stream in process
#                      memory (testing only)
#   type: cloudwatch   CloudWatch Logs with signed requests. Credentials not
#                      given here are read from AWS_ACCESS_KEY_ID,
#                      AWS_SECRET_ACCESS_KEY and AWS_SESSION_TOKEN.
#   type: http         CloudWatch Logs compatible JSON API without signing,
#                      for a signing proxy or a local emulator.

store:
  type: memory
  retain_events: 10000

# store:
#   type: cloudwatch
#   region: us-east-1
#   # endpoint: https://logs.us-east-1.amazonaws.com/
#   # access_key_id: AKIA...
#   # secret_access_key: ...
#   timeout: 10s

# store:
#   type: http
#   endpoint: http://localhost:4566
#   timeout: 10s
"#
    .to_string()
}
