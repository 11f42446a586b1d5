use strum_macros::EnumString;

use crate::commands::{CommandError, CommandParser, Context};
use crate::frame::Frame;
use crate::store::SortOptions;

#[derive(Debug, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
enum Modifier {
    Asc,
    Desc,
    Alpha,
    By,
    Get,
    Limit,
    Store,
}

/// Sorts the elements of the list or set stored at `key`, numerically unless `ALPHA` is
/// given.
///
/// Modifiers, in any order:
///
/// - `ASC` / `DESC`
/// - `ALPHA`: compare as byte strings.
/// - `BY pattern`: weigh each element by the string stored at `pattern` with its `*`
///   replaced by the element. A pattern without `*` skips sorting.
/// - `GET pattern`: reply with the value stored at `pattern` instead of the element, may be
///   repeated. `GET #` is the element itself.
/// - `LIMIT offset count`
/// - `STORE destination`: store the result as a list and reply with its length.
///
/// Ref: <https://redis.io/docs/latest/commands/sort/>
pub fn sort(ctx: &mut Context<'_, '_>, parser: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = parser.next_string()?;

    let mut options = SortOptions::default();
    let mut destination = None;

    while let Some(token) = parser.next_optional_string()? {
        let modifier = token.parse::<Modifier>().map_err(|_| CommandError::Syntax)?;

        match modifier {
            Modifier::Asc => options.desc = false,
            Modifier::Desc => options.desc = true,
            Modifier::Alpha => options.alpha = true,
            Modifier::By => options.by = Some(parser.next_string()?),
            Modifier::Get => options.get.push(parser.next_string()?),
            Modifier::Limit => {
                let offset = parser.next_integer()?;
                let count = parser.next_integer()?;
                options.limit = Some((offset, count));
            }
            Modifier::Store => destination = Some(parser.next_string()?),
        }
    }

    match destination {
        Some(destination) => {
            let len = ctx.db().sort_store(&key, &options, &destination)?;
            Ok(Frame::Integer(len as i64))
        }
        None => {
            let fields = ctx.db().sort(&key, &options)?;
            Ok(Frame::Array(
                fields.into_iter().map(Frame::bulk_or_null).collect(),
            ))
        }
    }
}
