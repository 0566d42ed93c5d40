use lendkit_common::{flash_loan::FlashLoanRequest, models::money_bag::MoneyBag};
use tracing::instrument;

use super::{
    check_borrow_min, clamp_to_available, composed, delivered, ensure_borrow, ensure_supply,
    full_balance_bps, rejected, repay_operation, requested_amount, withdraw_operations, Action,
    ActionOutput, ActionParams, AmountField, Composer, ErrorCode, OperationError,
};
use crate::errors::ComposerError;

impl Composer {
    /// Repays `src_amount` of `src_asset` debt with `dest_asset` collateral.
    ///
    /// The collateral asset is flash-borrowed and swapped into the debt asset, unless both are the
    /// same asset. After the repay, collateral covering the flash repay is withdrawn.
    /// `dest_amount` is the collateral withdrawn.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn deleverage(&self, params: ActionParams<'_>) -> Result<ActionOutput, ComposerError> {
        let action = Action::Deleverage;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };

        ensure_borrow(portfolio, &params.src_asset)?;
        ensure_supply(portfolio, &params.dest_asset)?;

        let debt = portfolio.max_repay_amount(&params.src_asset);
        let (src_amount, requested, shortfall) = clamp_to_available(src_amount, requested, debt);
        if let Some(error) = shortfall.filter(|_| requested.is_zero()) {
            return Ok(rejected(action, portfolio.clone(), "0".to_string(), error));
        }

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let target = self.repay_target(&src_amount, &params.dest_asset);
        let swap = self
            .quote_exact_out(&params.dest_asset, &target, slippage_bps)
            .await?;
        let flash_loan = self
            .quote_flash_loan(
                portfolio.chain(),
                FlashLoanRequest::Loans(MoneyBag::from_instances([&swap.input])?),
            )
            .await?;
        let mut dest_amount = flash_loan.repay(&params.dest_asset)?;
        dest_amount.add_wei(self.config.withdraw_slack_wei());
        let repaid = delivered(&swap, &src_amount);
        let repaid_value = repaid.to_decimal()?;

        let mut after = portfolio.clone();
        after.repay(&params.src_asset, repaid_value);
        let withdrawn = dest_amount.to_decimal()?;
        let collateral = portfolio.max_withdraw_amount(&params.dest_asset);
        after.withdraw(&params.dest_asset, withdrawn);
        let violation = shortfall
            .or_else(|| {
                (withdrawn > collateral).then(|| {
                    OperationError::new(AmountField::DestAmount, ErrorCode::InsufficientAmount)
                })
            })
            .or_else(|| check_borrow_min(&after, &params.src_asset, AmountField::SrcAmount))
            .or_else(|| self.check_health(&after));
        if let Some(error) = violation {
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }

        let (flash_loan_operation, flash_repay_operation) = flash_loan.operations().await?;
        let mut operations = vec![flash_loan_operation];
        operations.extend(swap.operation(params.account).await?);
        operations.push(
            repay_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                repaid,
                params.interest_rate_mode,
                full_balance_bps(repaid_value, debt),
            )
            .await?,
        );
        operations.extend(
            withdraw_operations(
                protocol.as_ref(),
                portfolio,
                params.account,
                dest_amount.clone(),
                full_balance_bps(withdrawn, collateral),
            )
            .await?,
        );
        operations.push(flash_repay_operation);

        Ok(composed(action, after, &dest_amount, operations))
    }
}
