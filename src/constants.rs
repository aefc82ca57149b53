// -
// Wire message fields

pub(crate) const FIELD_CMD: &str = "mqsh.cmd";
pub(crate) const FIELD_SUBJECT: &str = "mqsh.subject";
pub(crate) const FIELD_TYPE: &str = "mqsh.type";
pub(crate) const FIELD_PAIRS: &str = "mqsh.pairs";
pub(crate) const FIELD_KEYS: &str = "mqsh.keys";
pub(crate) const FIELD_REPLY: &str = "mqsh.reply";

/// Separator between `field=value` tokens of a message body
pub(crate) const FIELD_SEPARATOR: char = '&';
pub(crate) const FIELD_ASSIGN: char = '=';

/// Structural characters inside the `pairs` / `keys` fields
pub(crate) const PAIR_SEPARATOR: char = '|';
pub(crate) const VALUE_SEPARATOR: char = '~';
pub(crate) const CHANGE_ID_SEPARATOR: char = '%';

/// Joins the subjects of a multiplexed message
pub(crate) const SUBJECT_LIST_SEPARATOR: char = '%';

/// Delimits `#<subject index>#` key prefixes and escape tokens
pub(crate) const MUX_PREFIX_DELIMITER: char = '#';

pub(crate) const WILDCARD: char = '*';

/// Upper bound for one encoded wire message
pub const MAX_MESSAGE_SIZE: usize = 2_000_000;

/// Separates subject and key in `subject;key` notification tags
pub(crate) const NOTIFICATION_KEY_SEPARATOR: char = ';';
