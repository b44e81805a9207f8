//! Account endpoints.

use reqwest::Method;
use serde::{de::IgnoredAny, Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    codec::{map_envelope, map_field, text_field, Codec, CodecError, Envelope},
    ApiClient, ApiError, Call, Result,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// Hyphenated UUID.
    pub id: String,
    pub email: String,
    pub nickname: String,
}

pub struct LoginRequestCodec;

impl Codec<LoginRequest> for LoginRequestCodec {
    fn encode(&self, value: &LoginRequest) -> std::result::Result<Envelope, CodecError> {
        Ok(map_envelope([
            ("email", Envelope::Text(value.email.clone())),
            ("password", Envelope::Text(value.password.clone())),
        ]))
    }

    fn decode(&self, envelope: Envelope) -> std::result::Result<LoginRequest, CodecError> {
        Ok(LoginRequest {
            email: text_field(&envelope, "email")?,
            password: text_field(&envelope, "password")?,
        })
    }
}

pub struct SignupRequestCodec;

impl Codec<SignupRequest> for SignupRequestCodec {
    fn encode(&self, value: &SignupRequest) -> std::result::Result<Envelope, CodecError> {
        Ok(map_envelope([
            ("email", Envelope::Text(value.email.clone())),
            ("password", Envelope::Text(value.password.clone())),
            ("nickname", Envelope::Text(value.nickname.clone())),
        ]))
    }

    fn decode(&self, envelope: Envelope) -> std::result::Result<SignupRequest, CodecError> {
        Ok(SignupRequest {
            email: text_field(&envelope, "email")?,
            password: text_field(&envelope, "password")?,
            nickname: text_field(&envelope, "nickname")?,
        })
    }
}

pub struct UserResponseCodec;

impl Codec<UserResponse> for UserResponseCodec {
    fn encode(&self, value: &UserResponse) -> std::result::Result<Envelope, CodecError> {
        Ok(map_envelope([
            ("id", Envelope::Text(value.id.clone())),
            ("email", Envelope::Text(value.email.clone())),
            ("nickname", Envelope::Text(value.nickname.clone())),
        ]))
    }

    // The server may send the id as a 16-byte string rather than text.
    fn decode(&self, envelope: Envelope) -> std::result::Result<UserResponse, CodecError> {
        let id = match map_field(&envelope, "id") {
            Some(Envelope::Text(id)) => id.clone(),
            Some(Envelope::Bytes(raw)) => Uuid::from_slice(raw)
                .map(|id| id.hyphenated().to_string())
                .map_err(|_| CodecError::Field("id"))?,
            _ => return Err(CodecError::Field("id")),
        };
        Ok(UserResponse {
            id,
            email: text_field(&envelope, "email")?,
            nickname: text_field(&envelope, "nickname")?,
        })
    }
}

/// Account endpoints, borrowed from an [`ApiClient`].
#[derive(Clone, Copy, Debug)]
pub struct AccountApi<'c> {
    client: &'c ApiClient,
}

impl ApiClient {
    pub fn account(&self) -> AccountApi<'_> {
        AccountApi { client: self }
    }
}

impl AccountApi<'_> {
    /// Authenticates a user and creates a session.
    pub async fn login(&self, params: LoginRequest) -> Result<()> {
        let call = Call::<LoginRequest, IgnoredAny>::new(Method::POST, "/account/login")
            .body(params)
            .request_codec(&LoginRequestCodec);
        self.client.request(call).await.map(|_| ())
    }

    /// Destroys the current session.
    pub async fn logout(&self) -> Result<()> {
        let call = Call::<(), IgnoredAny>::new(Method::POST, "/account/logout");
        self.client.request(call).await.map(|_| ())
    }

    /// Returns the currently authenticated user.
    pub async fn me(&self) -> Result<UserResponse> {
        let call = Call::<(), UserResponse>::new(Method::GET, "/account/me")
            .response_codec(&UserResponseCodec);
        self.client
            .request(call)
            .await?
            .into_value()
            .ok_or_else(|| ApiError::unknown("empty response from /account/me"))
    }

    /// Creates a new user account.
    pub async fn signup(&self, params: SignupRequest) -> Result<()> {
        let call = Call::<SignupRequest, IgnoredAny>::new(Method::POST, "/account/signup")
            .body(params)
            .request_codec(&SignupRequestCodec);
        self.client.request(call).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::{SignupRequest, SignupRequestCodec, UserResponseCodec};
    use crate::codec::{map_envelope, Codec, CodecError, Envelope};

    #[test]
    fn user_id_accepts_binary_uuid() {
        let envelope = map_envelope([
            (
                "id",
                Envelope::Bytes(vec![
                    0x12, 0x3e, 0x45, 0x67, 0xe8, 0x9b, 0x12, 0xd3, 0xa4, 0x56, 0x42, 0x66, 0x14,
                    0x17, 0x40, 0x00,
                ]),
            ),
            ("email", Envelope::Text("kit@example.com".to_owned())),
            ("nickname", Envelope::Text("kit".to_owned())),
        ]);
        let user = UserResponseCodec.decode(envelope).expect("user must decode");
        assert_eq!(user.id, "123e4567-e89b-12d3-a456-426614174000");
        assert_eq!(user.nickname, "kit");
    }

    #[test]
    fn user_id_rejects_short_binary() {
        let envelope = map_envelope([
            ("id", Envelope::Bytes(vec![0x12, 0x3e, 0x45])),
            ("email", Envelope::Text("kit@example.com".to_owned())),
            ("nickname", Envelope::Text("kit".to_owned())),
        ]);
        let err = UserResponseCodec
            .decode(envelope)
            .expect_err("truncated id must fail");
        assert!(matches!(err, CodecError::Field("id")));
    }

    #[test]
    fn missing_field_names_the_field() {
        let envelope = map_envelope([("email", Envelope::Text("kit@example.com".to_owned()))]);
        let err = SignupRequestCodec
            .decode(envelope)
            .expect_err("incomplete signup must fail");
        assert!(matches!(err, CodecError::Field("password")));
    }

    #[test]
    fn signup_encodes_every_field() {
        let request = SignupRequest {
            email: "kit@example.com".to_owned(),
            password: "hunter2".to_owned(),
            nickname: "kit".to_owned(),
        };
        let envelope = SignupRequestCodec.encode(&request).expect("signup must encode");
        let decoded = SignupRequestCodec.decode(envelope).expect("signup must decode");
        assert_eq!(decoded, request);
    }
}
